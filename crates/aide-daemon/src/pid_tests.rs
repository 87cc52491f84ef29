
    use super::*;
    use tempfile::TempDir;

    fn temp_path() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aide.pid");
        (dir, path)
    }

    #[test]
    fn test_acquire_writes_current_pid() {
        let (_dir, path) = temp_path();
        let guard = PidFile::acquire(&path).unwrap();

        assert!(guard.is_held());
        assert_eq!(guard.pid(), std::process::id());
        assert_eq!(read_pid(&path).unwrap(), Some(std::process::id()));
    }

    #[test]
    fn test_drop_removes_file() {
        let (_dir, path) = temp_path();
        {
            let _guard = PidFile::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_release_is_idempotent() {
        let (_dir, path) = temp_path();
        let mut guard = PidFile::acquire(&path).unwrap();
        guard.release().unwrap();
        assert!(!path.exists());
        assert!(!guard.is_held());
        guard.release().unwrap();
    }

    #[test]
    fn test_second_instance_refused() {
        let (_dir, path) = temp_path();
        // PID 1 is always alive on Unix; use it as the foreign holder.
        fs::write(&path, "1").unwrap();

        let result = PidFile::acquire_for(&path, std::process::id());
        if is_process_running(1) {
            assert!(matches!(
                result,
                Err(DaemonError::AlreadyRunning { pid: 1, .. })
            ));
        }
    }

    #[test]
    fn test_stale_file_replaced() {
        let (_dir, path) = temp_path();
        // PID far above the default pid_max.
        fs::write(&path, "999999999").unwrap();

        let guard = PidFile::acquire(&path).unwrap();
        assert_eq!(read_pid(&path).unwrap(), Some(guard.pid()));
    }

    #[test]
    fn test_invalid_contents() {
        let (_dir, path) = temp_path();
        fs::write(&path, "not-a-pid").unwrap();

        let result = PidFile::acquire(&path);
        assert!(matches!(result, Err(DaemonError::PidFileRead { .. })));
    }

    #[test]
    fn test_empty_file_treated_as_absent() {
        let (_dir, path) = temp_path();
        fs::write(&path, "").unwrap();
        assert!(PidFile::acquire(&path).is_ok());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("subdir").join("deep").join("aide.pid");
        let _guard = PidFile::acquire(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_release_leaves_foreign_file() {
        let (_dir, path) = temp_path();
        let mut guard = PidFile::acquire(&path).unwrap();
        fs::write(&path, "4242").unwrap();

        guard.release().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_running_pid() {
        let (_dir, path) = temp_path();
        assert_eq!(PidFile::running_pid(&path).unwrap(), None);

        let _guard = PidFile::acquire(&path).unwrap();
        assert_eq!(
            PidFile::running_pid(&path).unwrap(),
            Some(std::process::id())
        );
    }

    #[test]
    fn test_is_process_running_current() {
        assert!(is_process_running(std::process::id()));
    }
