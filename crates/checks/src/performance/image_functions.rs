// Image Functions Check
// Flags hard-coded <img> tags in PHP sources

use regex::Regex;
use std::fs;

use plugin_check_core::application::{CheckError, StaticCheck};
use plugin_check_core::domain::{CheckContext, CheckResult, Finding};

pub struct ImageFunctionsCheck {
    img_tag: Regex,
}

impl ImageFunctionsCheck {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            img_tag: Regex::new(r"(?i)<img\b")?,
        })
    }
}

impl StaticCheck for ImageFunctionsCheck {
    fn run(&self, context: &CheckContext, result: &CheckResult) -> Result<(), CheckError> {
        for path in context.files_with_extension("php") {
            let source = fs::read_to_string(path).map_err(|e| CheckError::io(path, e))?;
            let file = context.relative_path(path);

            for (index, line) in source.lines().enumerate() {
                for found in self.img_tag.find_iter(line) {
                    result.add_finding(
                        Finding::warning(
                            "non_enqueued_image",
                            "Images should be added using wp_get_attachment_image() or similar functions.",
                        )
                        .in_file(file.clone())
                        .at(index as u32 + 1, found.start() as u32 + 1),
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reports_each_img_tag_with_location() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("images");
        fs::create_dir_all(root.join("templates")).unwrap();
        let main = root.join("images.php");
        let template = root.join("templates/banner.php");
        fs::write(&main, "<?php\n// Plugin Name: Images\n").unwrap();
        fs::write(
            &template,
            "<div>\n  <IMG src=\"a.png\"> <img src='b.png' />\n</div>\n<imgur>\n",
        )
        .unwrap();
        let ctx = CheckContext::for_directory(&main, vec![template]).unwrap();

        let result = CheckResult::new();
        ImageFunctionsCheck::new().unwrap().run(&ctx, &result).unwrap();

        let findings = result.findings();
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.file == "templates/banner.php"));
        assert_eq!((findings[0].line, findings[0].column), (2, 3));
        assert_eq!((findings[1].line, findings[1].column), (2, 21));
        assert_eq!(result.get_error_count(), 0);
    }

    #[test]
    fn test_unreadable_file_is_a_check_error() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("gone/gone.php");
        let ctx = CheckContext::for_directory(&main, vec![]).unwrap();

        let err = ImageFunctionsCheck::new()
            .unwrap()
            .run(&ctx, &CheckResult::new())
            .unwrap_err();
        assert!(matches!(err, CheckError::Io { .. }));
    }
}
