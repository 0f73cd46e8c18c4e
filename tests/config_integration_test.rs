//! Integration tests for configuration loading from the process environment
//! and an `lpac-kn.env` file.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use lpac_bridge::{BackendKind, Config};
use tempfile::TempDir;

// Global lock to prevent env var pollution between tests
static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: [&str; 6] = [
    "DRIVER_IFID",
    "AT_DEVICE",
    "AT_KN_ADDRESS",
    "AT_KN_LOGIN",
    "AT_KN_PASSWORD",
    "AT_TIMEOUT",
];

/// Clears every recognised variable and writes `content` as the env file.
fn setup_test_env(content: &str) -> (TempDir, PathBuf, std::sync::MutexGuard<'static, ()>) {
    let guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    for var in VARS {
        env::remove_var(var);
    }
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lpac-kn.env");
    fs::write(&path, content).unwrap();
    (temp_dir, path, guard)
}

#[test]
fn test_process_env_wins_over_file() {
    let (_dir, path, _guard) = setup_test_env("DRIVER_IFID=/dev/ttyFILE\nAT_TIMEOUT=30\n");
    env::set_var("DRIVER_IFID", "COM9");

    let config = Config::load_from(&path).unwrap();
    env::remove_var("DRIVER_IFID");

    assert_eq!(config.device.as_deref(), Some("COM9"));
    assert_eq!(config.read_timeout, Duration::from_secs(30));
    assert_eq!(config.backend_kind(), BackendKind::Serial);
}

#[test]
fn test_file_supplies_unset_variables() {
    let (_dir, path, _guard) = setup_test_env(concat!(
        "DRIVER_IFID=UsbLte0\n",
        "AT_KN_ADDRESS=http://192.168.1.1\n",
        "AT_KN_LOGIN=admin\n",
        "AT_KN_PASSWORD=a=b=c\n",
    ));

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.device.as_deref(), Some("UsbLte0"));
    assert_eq!(config.backend_kind(), BackendKind::Keenetic);
    let kn = config.keenetic.unwrap();
    assert_eq!(kn.address, "http://192.168.1.1");
    assert_eq!(kn.login, "admin");
    assert_eq!(kn.password, "a=b=c");
}

#[test]
fn test_process_env_overrides_file_credentials() {
    let (_dir, path, _guard) = setup_test_env(concat!(
        "AT_KN_ADDRESS=http://192.168.1.1\n",
        "AT_KN_LOGIN=admin\n",
        "AT_KN_PASSWORD=from-file\n",
    ));
    env::set_var("AT_KN_PASSWORD", "from-env");

    let config = Config::load_from(&path).unwrap();
    env::remove_var("AT_KN_PASSWORD");

    assert_eq!(config.keenetic.unwrap().password, "from-env");
}

#[test]
fn test_missing_file_uses_environment_only() {
    let (dir, _path, _guard) = setup_test_env("");
    env::set_var("AT_DEVICE", "/dev/ttyUSB2");

    let config = Config::load_from(&dir.path().join("absent.env")).unwrap();
    env::remove_var("AT_DEVICE");

    assert_eq!(config.device.as_deref(), Some("/dev/ttyUSB2"));
    assert_eq!(config.read_timeout, Duration::from_secs(10));
}

#[test]
fn test_file_address_without_login_is_an_error() {
    let (_dir, path, _guard) = setup_test_env("AT_KN_ADDRESS=http://192.168.1.1\n");

    let err = Config::load_from(&path).unwrap_err();
    assert_eq!(err.to_string(), "AT_KN_LOGIN is empty");
}
