//! HTCondor job ad reader
//!
//! When running inside an HTCondor job, the job description is available as
//! a file of `Attribute = Value` lines. We only pull out a handful of fields
//! for telemetry. Every field is optional and any read failure yields an
//! empty [`JobAd`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Metadata about the HTCondor job running this transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobAd {
    pub owner: Option<String>,
    pub project_name: Option<String>,
    pub cluster_id: Option<i64>,
    pub proc_id: Option<i64>,
    pub resource_name: Option<String>,
}

impl JobAd {
    /// Locate and parse the job ad for this process
    ///
    /// Looks at `_CONDOR_JOB_AD` first, then `.job.ad` in the working directory.
    pub fn discover() -> Self {
        let path = match std::env::var_os("_CONDOR_JOB_AD") {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from(".job.ad"),
        };

        if !path.exists() {
            return Self::default();
        }

        Self::from_file(&path)
    }

    /// Parse a job ad file, returning an empty ad on failure
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Failed to read job ad");
                Self::default()
            }
        }
    }

    /// Parse job ad text
    pub fn parse(contents: &str) -> Self {
        let attrs = parse_attributes(contents);

        let string = |name: &str| match attrs.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => {
                tracing::debug!(attribute = name, "Attribute missing from job ad");
                None
            }
        };
        let int = |name: &str| match attrs.get(name) {
            Some(Value::Integer(i)) => Some(*i),
            _ => {
                tracing::debug!(attribute = name, "Attribute missing from job ad");
                None
            }
        };

        Self {
            owner: string("owner"),
            project_name: string("projectname"),
            cluster_id: int("clusterid"),
            proc_id: int("procid"),
            resource_name: string("jobglidein_resourcename"),
        }
    }

    /// `<ClusterId>.<ProcId>` when both are known
    pub fn job_id(&self) -> Option<String> {
        match (self.cluster_id, self.proc_id) {
            (Some(cluster), Some(proc)) => Some(format!("{cluster}.{proc}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    String(String),
    Integer(i64),
    Expression,
}

/// Attribute names are case-insensitive, so keys are lowercased
fn parse_attributes(contents: &str) -> HashMap<String, Value> {
    let mut attrs = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, raw)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let raw = raw.trim();

        let value = if let Some(quoted) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
            Value::String(quoted.replace("\\\"", "\"").replace("\\\\", "\\"))
        } else if let Ok(i) = raw.parse::<i64>() {
            Value::Integer(i)
        } else {
            Value::Expression
        };

        attrs.insert(name, value);
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
ClusterId = 4242
ProcId = 7
Owner = "alice"
ProjectName = "OSG-Staff"
JOBGLIDEIN_ResourceName = "Nebraska"
RequestMemory = ifthenelse(MemoryUsage =!= undefined, MemoryUsage, 1024)
"#;

    #[test]
    fn test_parse_job_ad() {
        let ad = JobAd::parse(SAMPLE);
        assert_eq!(ad.owner.as_deref(), Some("alice"));
        assert_eq!(ad.project_name.as_deref(), Some("OSG-Staff"));
        assert_eq!(ad.cluster_id, Some(4242));
        assert_eq!(ad.proc_id, Some(7));
        assert_eq!(ad.resource_name.as_deref(), Some("Nebraska"));
        assert_eq!(ad.job_id().as_deref(), Some("4242.7"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let ad = JobAd::parse("Owner = \"bob\"\n");
        assert_eq!(ad.owner.as_deref(), Some("bob"));
        assert!(ad.project_name.is_none());
        assert!(ad.job_id().is_none());
    }

    #[test]
    fn test_attribute_names_case_insensitive() {
        let ad = JobAd::parse("owner = \"carol\"\nCLUSTERID = 1\nprocid = 0\n");
        assert_eq!(ad.owner.as_deref(), Some("carol"));
        assert_eq!(ad.job_id().as_deref(), Some("1.0"));
    }

    #[test]
    fn test_unreadable_file_is_empty() {
        let ad = JobAd::from_file(Path::new("/definitely/not/here/.job.ad"));
        assert_eq!(ad, JobAd::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".job.ad");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(JobAd::from_file(&path).cluster_id, Some(4242));
    }
}
