//! Per-shape field normalizers.
//!
//! A normalizer rewrites a raw record into the common field layout
//! (`message`, `level`, `hostname`, `systemd.*`, time). It never fails:
//! fields it cannot derive are left unset.

pub mod journal;
pub mod k8s_json_file;
pub mod var_log;

use crate::clock::Clock;
use crate::record::Record;
use crate::rules::FormatterKind;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use journal::JournalNormalizer;
pub use k8s_json_file::K8sJsonFileNormalizer;
pub use var_log::VarLogNormalizer;

pub trait FieldNormalizer: Send + Sync {
    /// `time` is the event time the host attached to the record.
    fn normalize(&self, tag: &str, time: DateTime<Utc>, record: &mut Record, kind: FormatterKind);
}

/// One normalizer per record shape. Both journal kinds share one.
#[derive(Clone)]
pub struct Normalizers {
    pub journal: Arc<dyn FieldNormalizer>,
    pub var_log: Arc<dyn FieldNormalizer>,
    pub k8s_json_file: Arc<dyn FieldNormalizer>,
}

impl Normalizers {
    pub fn standard(
        dest_time_name: &str,
        docker_hostname: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Normalizers {
            journal: Arc::new(JournalNormalizer::new(
                dest_time_name,
                docker_hostname.clone(),
            )),
            var_log: Arc::new(VarLogNormalizer::new(
                dest_time_name,
                docker_hostname.clone(),
                clock,
            )),
            k8s_json_file: Arc::new(K8sJsonFileNormalizer::new(dest_time_name, docker_hostname)),
        }
    }

    pub fn for_kind(&self, kind: FormatterKind) -> &dyn FieldNormalizer {
        match kind {
            FormatterKind::SysJournal | FormatterKind::K8sJournal => self.journal.as_ref(),
            FormatterKind::SysVarLog => self.var_log.as_ref(),
            FormatterKind::K8sJsonFile => self.k8s_json_file.as_ref(),
        }
    }
}

impl std::fmt::Debug for Normalizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizers").finish_non_exhaustive()
    }
}

/// `docker_hostname` when `host` is `localhost` and one is known, else `host`.
pub(crate) fn resolve_localhost(host: &serde_json::Value, docker_hostname: Option<&str>) -> serde_json::Value {
    match (host.as_str(), docker_hostname) {
        (Some("localhost"), Some(docker)) => serde_json::Value::String(docker.to_string()),
        _ => host.clone(),
    }
}
