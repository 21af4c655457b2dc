//! 오프셋 저장소 -- 파일별 마지막 처리 바이트 위치를 영속화합니다.
//!
//! 상태 파일은 `{"/abs/path.log": 1234}` 형태의 평면 JSON 객체입니다.
//! 경로가 아닌 키는 보존되어 다른 버전이 추가한 필드를 잃지 않습니다.
//! 스케줄러는 패스 시작 시 한 번 [`OffsetStore::load_with_policy`]를 호출하고,
//! 패스 종료 시 한 번 [`OffsetStore::save`]를 호출합니다.
//!
//! # 원자적 저장
//! `<state>.tmp`에 기록하고 fsync한 뒤 rename으로 교체합니다.
//! 동시에 `load`를 호출해도 부분적으로 기록된 파일을 보지 않습니다.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::StateCorruptPolicy;
use crate::error::MonitorError;

/// 파일 경로 -> 마지막 처리 바이트 오프셋
///
/// 절대 경로 키는 오프셋(음이 아닌 정수)이어야 하며, 그렇지 않으면 문서 전체가 손상으로 취급됩니다.
/// 그 밖의 키(예: `"format_version"`)는 해석하지 않고 저장 시 그대로 다시 씁니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StateDocument", into = "StateDocument")]
pub struct OffsetRecord {
    offsets: BTreeMap<String, u64>,
    extra: BTreeMap<String, serde_json::Value>,
}

/// 상태 파일의 원형 (평면 JSON 객체)
type StateDocument = BTreeMap<String, serde_json::Value>;

impl TryFrom<StateDocument> for OffsetRecord {
    type Error = String;

    fn try_from(doc: StateDocument) -> Result<Self, Self::Error> {
        let mut record = Self::default();
        for (k, v) in doc {
            if !Path::new(&k).is_absolute() {
                record.extra.insert(k, v);
                continue;
            }
            match v.as_u64() {
                Some(offset) => {
                    record.offsets.insert(k, offset);
                }
                None => return Err(format!("invalid offset {v} for {k}")),
            }
        }
        Ok(record)
    }
}

impl From<OffsetRecord> for StateDocument {
    fn from(record: OffsetRecord) -> Self {
        let mut doc = record.extra;
        doc.extend(
            record
                .offsets
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::from(v))),
        );
        doc
    }
}

impl OffsetRecord {
    /// 빈 레코드를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 경로의 오프셋을 반환합니다. 기록이 없으면 0입니다.
    pub fn get(&self, path: &Path) -> u64 {
        self.offsets.get(&key(path)).copied().unwrap_or(0)
    }

    /// 경로의 오프셋을 기록합니다.
    pub fn set(&mut self, path: &Path, offset: u64) {
        self.offsets.insert(key(path), offset);
    }

    /// 경로의 기록을 지웁니다. 기록이 있었으면 `true`입니다.
    pub fn remove(&mut self, path: &Path) -> bool {
        self.offsets.remove(&key(path)).is_some()
    }

    /// 기록된 경로 수 (오프셋이 아닌 키는 제외)
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// 기록이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// (경로, 오프셋) 순회
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.offsets.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// 오프셋이 아닌 키를 반환합니다.
    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// JSON 파일 기반 오프셋 저장소
#[derive(Debug, Clone)]
pub struct OffsetStore {
    path: PathBuf,
}

impl OffsetStore {
    /// 상태 파일 경로로 저장소를 생성합니다. 파일은 아직 없어도 됩니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 상태 파일 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 영속화된 오프셋을 읽습니다.
    ///
    /// 파일이 없으면 빈 레코드를, 파일이 있지만 해석할 수 없으면
    /// [`MonitorError::StateCorrupt`]를 반환합니다.
    pub async fn load(&self) -> Result<OffsetRecord, MonitorError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no offset state yet, starting empty");
                return Ok(OffsetRecord::new());
            }
            Err(e) => return Err(MonitorError::Io(e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| MonitorError::StateCorrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// 손상 정책을 적용하여 오프셋을 읽습니다.
    ///
    /// - `Reset`: 손상 파일을 `<state>.corrupt`로 옮기고 빈 레코드로 계속합니다.
    /// - `Abort`: `StateCorrupt`를 그대로 반환합니다.
    pub async fn load_with_policy(
        &self,
        policy: StateCorruptPolicy,
    ) -> Result<OffsetRecord, MonitorError> {
        match self.load().await {
            Err(MonitorError::StateCorrupt { path, reason })
                if policy == StateCorruptPolicy::Reset =>
            {
                let backup = self.sibling(".corrupt");
                warn!(
                    path = %path,
                    reason = %reason,
                    backup = %backup.display(),
                    "offset state is corrupt, moving it aside and starting fresh"
                );
                if let Err(e) = tokio::fs::rename(&self.path, &backup).await {
                    warn!(path = %path, error = %e, "failed to move corrupt offset state aside");
                }
                Ok(OffsetRecord::new())
            }
            other => other,
        }
    }

    /// 오프셋을 원자적으로 저장합니다.
    pub async fn save(&self, record: &OffsetRecord) -> Result<(), MonitorError> {
        let write_err = |source: std::io::Error| MonitorError::StateWrite {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let json = serde_json::to_vec(record)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        let tmp = self.sibling(".tmp");
        let mut file = tokio::fs::File::create(&tmp).await.map_err(write_err)?;
        file.write_all(&json).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;

        debug!(path = %self.path.display(), entries = record.len(), "offset state saved");
        Ok(())
    }

    /// 상태 파일 이름 뒤에 접미사를 붙인 경로
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_defaults_to_zero() {
        let record = OffsetRecord::new();
        assert_eq!(record.get(Path::new("/var/log/missing.log")), 0);
        assert!(record.is_empty());
    }

    #[test]
    fn record_serializes_as_flat_object() {
        let mut record = OffsetRecord::new();
        record.set(Path::new("/var/log/app.log"), 250);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"/var/log/app.log":250}"#);
    }

    #[tokio::test]
    async fn load_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path().join("state.json"));
        let record = store.load().await.unwrap();
        assert!(record.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_returns_same_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path().join("state.json"));

        let mut record = OffsetRecord::new();
        record.set(Path::new("/var/log/a.log"), 100);
        record.set(Path::new("/var/log/b.log"), 7);
        store.save(&record).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.get(Path::new("/var/log/a.log")), 100);
    }

    #[tokio::test]
    async fn save_creates_parent_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("nested/deeper/state.json");
        let store = OffsetStore::new(&state);

        store.save(&OffsetRecord::new()).await.unwrap();

        assert!(state.exists());
        assert!(!dir.path().join("nested/deeper/state.json.tmp").exists());
    }

    #[tokio::test]
    async fn load_reads_document_written_by_other_tools() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        tokio::fs::write(&state, r#"{"/var/log/syslog.log": 4096, "/opt/x.log": 0}"#)
            .await
            .unwrap();

        let record = OffsetStore::new(&state).load().await.unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get(Path::new("/var/log/syslog.log")), 4096);
    }

    #[tokio::test]
    async fn load_corrupt_file_returns_state_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        tokio::fs::write(&state, "{not json").await.unwrap();

        let err = OffsetStore::new(&state).load().await.unwrap_err();
        assert!(matches!(err, MonitorError::StateCorrupt { .. }));
    }

    #[tokio::test]
    async fn negative_offset_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        tokio::fs::write(&state, r#"{"/var/log/a.log": -5}"#).await.unwrap();

        let err = OffsetStore::new(&state).load().await.unwrap_err();
        assert!(matches!(err, MonitorError::StateCorrupt { .. }));
    }

    #[tokio::test]
    async fn unknown_keys_survive_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        tokio::fs::write(
            &state,
            r#"{"/var/log/a.log": 4096, "format_version": "2", "host": {"name": "web-01"}}"#,
        )
        .await
        .unwrap();

        let store = OffsetStore::new(&state);
        let mut record = store
            .load_with_policy(StateCorruptPolicy::Reset)
            .await
            .unwrap();
        assert_eq!(record.get(Path::new("/var/log/a.log")), 4096);
        assert_eq!(record.len(), 1);
        assert!(!dir.path().join("state.json.corrupt").exists());

        record.set(Path::new("/var/log/a.log"), 5000);
        store.save(&record).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&state).await.unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "/var/log/a.log": 5000,
                "format_version": "2",
                "host": {"name": "web-01"}
            })
        );
    }

    #[tokio::test]
    async fn non_integer_offset_for_path_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        tokio::fs::write(&state, r#"{"/var/log/a.log": "4096"}"#)
            .await
            .unwrap();

        let err = OffsetStore::new(&state).load().await.unwrap_err();
        assert!(matches!(err, MonitorError::StateCorrupt { .. }));
    }

    #[test]
    fn remove_forgets_path() {
        let mut record = OffsetRecord::new();
        record.set(Path::new("/var/log/old.log"), 10);
        assert!(record.remove(Path::new("/var/log/old.log")));
        assert!(!record.remove(Path::new("/var/log/old.log")));
        assert!(record.is_empty());
    }

    #[tokio::test]
    async fn reset_policy_quarantines_and_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        tokio::fs::write(&state, "garbage").await.unwrap();

        let store = OffsetStore::new(&state);
        let record = store
            .load_with_policy(StateCorruptPolicy::Reset)
            .await
            .unwrap();

        assert!(record.is_empty());
        assert!(!state.exists());
        let backup = dir.path().join("state.json.corrupt");
        assert_eq!(tokio::fs::read_to_string(backup).await.unwrap(), "garbage");
    }

    #[tokio::test]
    async fn abort_policy_propagates_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        tokio::fs::write(&state, "garbage").await.unwrap();

        let err = OffsetStore::new(&state)
            .load_with_policy(StateCorruptPolicy::Abort)
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::StateCorrupt { .. }));
        // 원본 파일은 그대로 남음
        assert!(state.exists());
    }

    #[tokio::test]
    async fn save_overwrites_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path().join("state.json"));

        let mut first = OffsetRecord::new();
        first.set(Path::new("/a.log"), 1);
        store.save(&first).await.unwrap();

        let mut second = OffsetRecord::new();
        second.set(Path::new("/b.log"), 2);
        store.save(&second).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, second);
        assert_eq!(loaded.get(Path::new("/a.log")), 0);
    }
}
