//! Cross-process behavior of the update lock.
//!
//! The other process is this test binary again, started with a filter that
//! runs only [`lock_holder_child`]. The child reports on stdout whether it got
//! the lock and, when it did, keeps holding it until it is killed.

use rtpm_cli::update::UpdateLock;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;

const CHILD_DIR_VAR: &str = "RTPM_TEST_LOCK_CHILD_DIR";
const LOCKED: &str = "CHILD-LOCKED";
const DENIED: &str = "CHILD-DENIED";

/// Runs only when started by [`spawn_lock_holder`].
#[test]
fn lock_holder_child() {
    let Some(dir) = std::env::var_os(CHILD_DIR_VAR) else {
        return;
    };

    match UpdateLock::try_acquire_blocking(Path::new(&dir)).unwrap() {
        Some(_lock) => {
            println!("{LOCKED}");
            // Held until the parent kills this process
            std::thread::sleep(Duration::from_secs(120));
        }
        None => println!("{DENIED}"),
    }
}

fn spawn_lock_holder(dir: &Path) -> (Child, BufReader<ChildStdout>) {
    let mut child = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "lock::lock_holder_child", "--nocapture", "--test-threads=1"])
        .env(CHILD_DIR_VAR, dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let stdout = BufReader::new(child.stdout.take().unwrap());
    (child, stdout)
}

/// Reads the child's output until it says whether it got the lock.
fn child_report(stdout: &mut BufReader<ChildStdout>) -> &'static str {
    let mut line = String::new();
    loop {
        line.clear();
        let read = stdout.read_line(&mut line).unwrap();
        assert!(read > 0, "lock holder exited without reporting");
        if line.contains(LOCKED) {
            return LOCKED;
        }
        if line.contains(DENIED) {
            return DENIED;
        }
    }
}

#[test]
fn test_second_process_is_denied_while_lock_held() {
    let temp = TempDir::new().unwrap();
    let lock = UpdateLock::try_acquire_blocking(temp.path()).unwrap().unwrap();

    let (mut child, mut stdout) = spawn_lock_holder(temp.path());
    assert_eq!(child_report(&mut stdout), DENIED);
    assert!(child.wait().unwrap().success());

    lock.release();
}

#[test]
fn test_lock_freed_when_holder_is_killed() {
    let temp = TempDir::new().unwrap();

    let (mut child, mut stdout) = spawn_lock_holder(temp.path());
    assert_eq!(child_report(&mut stdout), LOCKED);

    assert!(
        UpdateLock::try_acquire_blocking(temp.path()).unwrap().is_none(),
        "lock must be exclusive across processes"
    );

    child.kill().unwrap();
    child.wait().unwrap();

    let lock = UpdateLock::try_acquire_blocking(temp.path()).unwrap();
    assert!(lock.is_some(), "the OS must release the lock of a dead process");
}

#[test]
fn test_released_lock_can_be_taken_by_another_process() {
    let temp = TempDir::new().unwrap();
    let lock = UpdateLock::try_acquire_blocking(temp.path()).unwrap().unwrap();
    lock.release();

    assert!(UpdateLock::lock_path(temp.path()).exists(), "lock file stays after release");

    let (mut child, mut stdout) = spawn_lock_holder(temp.path());
    assert_eq!(child_report(&mut stdout), LOCKED);
    child.kill().unwrap();
    child.wait().unwrap();
}

#[tokio::test]
async fn test_lock_creates_missing_install_dir() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("opt").join("rtpm");

    let lock = UpdateLock::try_acquire(&dir).await.unwrap().unwrap();
    assert!(lock.is_held());
    assert_eq!(lock.path(), UpdateLock::lock_path(&dir));
    assert!(dir.is_dir());
}
