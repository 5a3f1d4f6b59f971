//! Live integration test against a running gnome-keyring daemon.
//! Run inside an unlocked GNOME session with:
//! cargo test --test gnome_keyring_live -- --ignored

use keyring_gnome::credentials::gnome_keyring::{self, ResultCode};
use keyring_gnome::credentials::GnomeKeyring;
use secrecy::{ExposeSecret, SecretString};

const SERVICE: &str = "keyring-gnome-live-test.example.com";

#[test]
#[ignore] // Run manually with --ignored flag
fn test_live_round_trip() {
    assert!(
        gnome_keyring::is_supported(),
        "DESKTOP_SESSION must be \"gnome\" and libgnome-keyring must be installed"
    );
    let keyring = GnomeKeyring::default();

    keyring
        .set_password(SERVICE, "alice", &SecretString::from("p@ss".to_string()))
        .expect("store failed");

    let password = keyring
        .get_password(SERVICE, "alice")
        .expect("lookup failed")
        .expect("password missing after store");
    assert_eq!(password.expose_secret(), "p@ss");

    keyring
        .delete_password(SERVICE, "alice")
        .expect("delete failed");
    assert!(keyring.get_password(SERVICE, "alice").unwrap().is_none());
}

#[test]
#[ignore]
fn test_live_delete_missing_is_not_found() {
    let keyring = GnomeKeyring::default();

    let err = keyring
        .delete_password(SERVICE, "never-stored")
        .unwrap_err();
    assert_eq!(err.result_code(), Some(ResultCode::NotFound));
}

#[test]
#[ignore]
fn test_live_library_binding() {
    assert!(gnome_keyring::is_library_available());
    match gnome_keyring::global_library() {
        Ok(library) => println!("bound {}", library.name()),
        Err(err) => panic!("{err}"),
    }
}
