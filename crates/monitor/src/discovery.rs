//! 로그 파일 탐색 -- 루트 디렉토리를 재귀적으로 순회하여 `.log` 파일을 찾습니다.
//!
//! 접근할 수 없는 하위 디렉토리는 경고만 남기고 건너뜁니다.
//! 루트 디렉토리가 없으면 에러가 아니라 빈 결과를 반환하며,
//! 이를 치명적으로 볼지는 호출자가 결정합니다.
//!
//! 동기 I/O이므로 async 컨텍스트에서는 `tokio::task::spawn_blocking` 안에서 호출합니다.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// 로그 파일로 인식하는 이름 접미사 (대소문자 무시)
pub const LOG_SUFFIX: &str = ".log";

/// 탐색 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    /// 발견된 로그 파일 (절대 경로, 사전순 정렬)
    pub files: Vec<PathBuf>,
    /// 접근 실패로 건너뛴 항목 수
    pub skipped: usize,
    /// 루트 디렉토리 존재 여부
    pub root_exists: bool,
}

/// 파일 이름이 `.log`로 끝나는지 확인합니다.
pub fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|name| name.ends_with(LOG_SUFFIX))
}

/// 루트 디렉토리 아래의 모든 로그 파일을 찾습니다.
///
/// 디렉토리 심볼릭 링크는 따라 들어가지 않지만, 일반 파일을 가리키는
/// `.log` 심볼릭 링크는 포함합니다 (예: `/var/log/containers/*.log`).
/// 대상을 확인할 수 없는 링크는 `skipped`로 셉니다.
/// 결과는 사전순으로 정렬되어 같은 파일시스템 상태에서는 항상 같은 순서를 반환합니다.
pub fn discover(root: &Path) -> Discovered {
    let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());

    if !root.exists() {
        debug!(root = %root.display(), "log directory does not exist");
        return Discovered::default();
    }

    let mut files = Vec::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                skipped += 1;
                warn!(
                    path = %e.path().map(|p| p.display().to_string()).unwrap_or_default(),
                    error = %e,
                    "skipping inaccessible entry during discovery"
                );
                continue;
            }
        };

        if !is_log_file(entry.path()) {
            continue;
        }

        let regular = if entry.path_is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(meta) => meta.is_file(),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "skipping unresolvable log symlink"
                    );
                    continue;
                }
            }
        } else {
            entry.file_type().is_file()
        };

        if regular {
            files.push(entry.into_path());
        }
    }

    files.sort();

    debug!(
        root = %root.display(),
        files = files.len(),
        skipped,
        "log discovery finished"
    );

    Discovered {
        files,
        skipped,
        root_exists: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn is_log_file_is_case_insensitive() {
        assert!(is_log_file(Path::new("/var/log/app.log")));
        assert!(is_log_file(Path::new("/var/log/APP.LOG")));
        assert!(is_log_file(Path::new("/var/log/app.Log")));
        assert!(!is_log_file(Path::new("/var/log/app.log.1")));
        assert!(!is_log_file(Path::new("/var/log/app.txt")));
        assert!(!is_log_file(Path::new("/var/log/log")));
        assert!(!is_log_file(Path::new("/var/log/catalog")));
        assert!(is_log_file(Path::new("/var/log/.log")));
    }

    #[test]
    fn missing_root_returns_empty() {
        let result = discover(Path::new("/nonexistent/logsentinel/test/root"));
        assert!(result.files.is_empty());
        assert!(!result.root_exists);
    }

    #[test]
    fn discovers_nested_logs_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("nginx")).unwrap();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("zeta.log"), "z").unwrap();
        fs::write(root.join("nginx/access.LOG"), "a").unwrap();
        fs::write(root.join("a/b/c/deep.log"), "d").unwrap();
        fs::write(root.join("notes.txt"), "n").unwrap();
        fs::write(root.join("nginx/error.log.gz"), "g").unwrap();

        let result = discover(root);
        let names: Vec<_> = result
            .files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("a/b/c/deep.log"),
                PathBuf::from("nginx/access.LOG"),
                PathBuf::from("zeta.log"),
            ]
        );
        assert!(result.root_exists);
        assert_eq!(result.skipped, 0);
    }

    #[test]
    fn directories_named_like_logs_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("archive.log")).unwrap();
        fs::write(dir.path().join("archive.log/inner.log"), "x").unwrap();

        let result = discover(dir.path());
        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].ends_with("archive.log/inner.log"));
    }

    #[test]
    fn returned_paths_are_absolute() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.log"), "1").unwrap();
        let result = discover(dir.path());
        assert!(result.files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn repeated_discovery_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.log", "a.log", "b.log"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        assert_eq!(discover(dir.path()), discover(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_log_files_are_included() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let real = dir.path().join("real");
        fs::create_dir_all(&logs).unwrap();
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("target.txt"), "container output\n").unwrap();
        symlink(real.join("target.txt"), logs.join("pod.log")).unwrap();

        let result = discover(&logs);

        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].ends_with("logs/pod.log"));
        assert_eq!(result.skipped, 0);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_log_symlink_is_skipped() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        symlink(dir.path().join("gone"), dir.path().join("stale.log")).unwrap();
        fs::write(dir.path().join("live.log"), "x").unwrap();

        let result = discover(dir.path());

        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].ends_with("live.log"));
        assert_eq!(result.skipped, 1);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_descended() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let elsewhere = dir.path().join("elsewhere");
        fs::create_dir_all(&logs).unwrap();
        fs::create_dir_all(&elsewhere).unwrap();
        fs::write(elsewhere.join("outside.log"), "o").unwrap();
        symlink(&elsewhere, logs.join("linked")).unwrap();
        // 디렉토리를 가리키는 `.log` 링크도 파일로 취급하지 않음
        symlink(&elsewhere, logs.join("dir.log")).unwrap();

        let result = discover(&logs);

        assert!(result.files.is_empty());
        assert_eq!(result.skipped, 0);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_does_not_abort_scan() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("hidden.log"), "h").unwrap();
        fs::write(dir.path().join("visible.log"), "v").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let result = discover(dir.path());

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        // root 권한으로 실행되면 잠긴 디렉토리도 읽힐 수 있으므로 보이는 파일만 확인
        assert!(result.files.iter().any(|p| p.ends_with("visible.log")));
    }
}
