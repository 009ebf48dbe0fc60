//! Deterministic on-disk layout for uploads.
//!
//! Objects land at `{root}/{project}[/{module}]/{YYYYMMDD}/{HH}/{filename}`,
//! bucketed by the UTC hour of the upload so that whole days or hours can be
//! archived or synced as a directory.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use super::ObjectStoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPath {
    /// Final path component; the client name, or a random hex name when renaming.
    pub stored_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PathPlanner {
    root: PathBuf,
}

impl PathPlanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute where an upload is stored. Pure: nothing is created on disk.
    pub fn plan(
        &self,
        project: &str,
        module: Option<&str>,
        at: DateTime<Utc>,
        original_name: &str,
        rename: bool,
    ) -> Result<PlannedPath, ObjectStoreError> {
        if project.is_empty() {
            return Err(ObjectStoreError::InvalidArgument(
                "project must not be empty".to_string(),
            ));
        }
        validate_segment("project", project)?;

        let module = module.filter(|m| !m.is_empty());
        if let Some(module) = module {
            validate_segment("module", module)?;
        }

        let original_name = client_file_name(original_name);
        if original_name.is_empty() {
            return Err(ObjectStoreError::InvalidArgument(
                "file name must not be empty".to_string(),
            ));
        }
        validate_segment("file name", original_name)?;

        let stored_name = if rename {
            random_name(original_name)
        } else {
            original_name.to_string()
        };

        let mut path = self.root.join(project);
        if let Some(module) = module {
            path.push(module);
        }
        path.push(at.format("%Y%m%d").to_string());
        path.push(at.format("%H").to_string());
        path.push(&stored_name);

        Ok(PlannedPath { stored_name, path })
    }
}

fn validate_segment(field: &str, value: &str) -> Result<(), ObjectStoreError> {
    if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        return Err(ObjectStoreError::InvalidArgument(format!(
            "{field} '{value}' is not a valid path segment"
        )));
    }
    Ok(())
}

/// Last component of a client-supplied file name. Browsers and other
/// clients may send a full path with either separator.
pub fn client_file_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Hex MD5 of a fresh v4 UUID, keeping everything from the last dot of the
/// original name (`.bashrc` stays `.bashrc`).
fn random_name(original_name: &str) -> String {
    let digest = md5::compute(uuid::Uuid::new_v4().as_bytes());
    match original_name.rfind('.') {
        Some(dot) => format!("{digest:x}{}", &original_name[dot..]),
        None => format!("{digest:x}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_plan_without_module() {
        let planner = PathPlanner::new("/srv/oss");
        let planned = planner
            .plan("acct", None, at(10, 0), "report.pdf", false)
            .unwrap();
        assert_eq!(
            planned.path,
            PathBuf::from("/srv/oss/acct/20240501/10/report.pdf")
        );
        assert_eq!(planned.stored_name, "report.pdf");
    }

    #[test]
    fn test_plan_with_module() {
        let planner = PathPlanner::new("/srv/oss");
        let planned = planner
            .plan("acct", Some("invoices"), at(23, 59), "a.txt", false)
            .unwrap();
        assert_eq!(
            planned.path,
            PathBuf::from("/srv/oss/acct/invoices/20240501/23/a.txt")
        );
    }

    #[test]
    fn test_empty_module_is_omitted() {
        let planner = PathPlanner::new("/srv/oss");
        let planned = planner
            .plan("acct", Some(""), at(10, 0), "a.txt", false)
            .unwrap();
        assert_eq!(planned.path, PathBuf::from("/srv/oss/acct/20240501/10/a.txt"));
    }

    #[test]
    fn test_same_hour_bucket_is_deterministic() {
        let planner = PathPlanner::new("/srv/oss");
        let first = planner
            .plan("acct", Some("m"), at(10, 1), "a.txt", false)
            .unwrap();
        let second = planner
            .plan("acct", Some("m"), at(10, 58), "a.txt", false)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rename_keeps_extension() {
        let planner = PathPlanner::new("/srv/oss");
        let planned = planner
            .plan("acct", None, at(10, 0), "template.2019.12.18.doc", true)
            .unwrap();
        let (stem, ext) = planned.stored_name.split_once('.').unwrap();
        assert_eq!(ext, "doc");
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(planned.path.ends_with(&planned.stored_name));
    }

    #[test]
    fn test_rename_produces_distinct_names() {
        let planner = PathPlanner::new("/srv/oss");
        let a = planner.plan("acct", None, at(10, 0), "x", true).unwrap();
        let b = planner.plan("acct", None, at(10, 0), "x", true).unwrap();
        assert_ne!(a.stored_name, b.stored_name);
        assert!(!a.stored_name.contains('.'));
    }

    #[test]
    fn test_empty_project_is_rejected() {
        let planner = PathPlanner::new("/srv/oss");
        let err = planner
            .plan("", None, at(10, 0), "a.txt", false)
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_traversal_segments_are_rejected() {
        let planner = PathPlanner::new("/srv/oss");
        for (project, module, name) in [
            ("..", None, "a.txt"),
            ("acct", Some("../etc"), "a.txt"),
            ("acct", None, ".."),
            ("acct", None, "sub/.."),
            ("acct", None, "sub/"),
            ("acct", None, "a\0b"),
        ] {
            let err = planner
                .plan(project, module, at(10, 0), name, false)
                .unwrap_err();
            assert!(matches!(err, ObjectStoreError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_client_paths_reduce_to_base_name() {
        let planner = PathPlanner::new("/srv/oss");
        for name in ["sub/a.txt", "../../a.txt", "C:\\Users\\me\\a.txt"] {
            let planned = planner.plan("acct", None, at(10, 0), name, false).unwrap();
            assert_eq!(planned.stored_name, "a.txt");
            assert_eq!(planned.path, PathBuf::from("/srv/oss/acct/20240501/10/a.txt"));
        }
    }

    #[test]
    fn test_rename_accepts_client_paths() {
        let planner = PathPlanner::new("/srv/oss");
        let planned = planner
            .plan("acct", None, at(10, 0), "dir\\photo.png", true)
            .unwrap();
        assert!(planned.stored_name.ends_with(".png"));
        assert_eq!(planned.stored_name.len(), 36);
    }

    #[test]
    fn test_rename_keeps_dotfile_suffix() {
        let planner = PathPlanner::new("/srv/oss");
        let planned = planner
            .plan("acct", None, at(10, 0), ".bashrc", true)
            .unwrap();
        assert!(planned.stored_name.ends_with(".bashrc"));
        assert_eq!(planned.stored_name.len(), 32 + ".bashrc".len());
    }
}
