mod common;

use clap::Parser;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{read_lines, write_zip};
use runlock::{Cli, Config, SharedState, run};

fn config(root: &std::path::Path, words: &std::path::Path) -> Config {
    let cli = Cli::try_parse_from([
        "runlock",
        "-z",
        root.to_str().unwrap(),
        "-p",
        words.to_str().unwrap(),
        "-j",
        "4",
    ])
    .unwrap();
    Config::from_cli(&cli).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn recovers_persists_and_skips_on_rerun() {
    let work = TempDir::new().unwrap();
    let root = work.path().join("archives");
    std::fs::create_dir(&root).unwrap();
    let root = root.canonicalize().unwrap();

    write_zip(&root.join("invoice_2023.zip"), Some("Invoice2023!"));
    write_zip(&root.join("readme.zip"), None);
    std::fs::create_dir(root.join("deep")).unwrap();
    write_zip(&root.join("deep").join("vault.zip"), Some("zq#unguessable#7"));

    let words = work.path().join("words.txt");
    std::fs::write(&words, "invoice2023!\nhunter2\n").unwrap();

    let config = config(&root, &words);
    let summary = run(&config, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.dispatch.found(), 1);
    assert_eq!(summary.dispatch.exhausted(), 1);
    assert!(!summary.interrupted);
    assert_eq!(summary.journal.dropped, 0);

    let invoice = root.join("invoice_2023.zip");
    let vault = root.join("deep").join("vault.zip");
    assert_eq!(
        read_lines(&root.join("found_passwords.txt")),
        vec![format!("File: {} | Password: Invoice2023!", invoice.display())]
    );
    assert_eq!(read_lines(&root.join("common_passwords.txt")), vec!["Invoice2023!"]);
    assert_eq!(
        read_lines(&root.join("not_found.txt")),
        vec![vault.display().to_string()]
    );

    // Everything written is read back on the next start
    let state = SharedState::load(&config.files, &config.user_passwords)
        .await
        .unwrap();
    assert_eq!(state.found_password(&invoice).as_deref(), Some("Invoice2023!"));
    assert!(state.is_common("Invoice2023!"));
    assert!(state.is_exhausted(&vault));

    // Solved archives are not discovered again
    let again = run(&config, &CancellationToken::new()).await.unwrap();
    assert_eq!(again.discovered, 1);
    assert_eq!(again.dispatch.found(), 0);
    assert_eq!(read_lines(&root.join("not_found.txt")).len(), 1);
}

#[tokio::test]
async fn cancelled_before_start_does_no_work() {
    let work = TempDir::new().unwrap();
    let root = work.path().canonicalize().unwrap();
    write_zip(&root.join("a.zip"), Some("secret"));
    let words = root.join("words.txt");
    std::fs::write(&words, "secret\n").unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let summary = run(&config(&root, &words), &token).await.unwrap();

    assert!(summary.interrupted);
    assert!(summary.dispatch.reports.is_empty());
    assert!(read_lines(&root.join("found_passwords.txt")).is_empty());
}
