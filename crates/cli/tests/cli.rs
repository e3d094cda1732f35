use assert_cmd::Command;

fn vitrina() -> Command {
    let mut cmd = Command::cargo_bin("vitrina").unwrap();
    cmd.env_remove("VITRINA_ENV")
        .env_remove("VITRINA_CONFIG_DIR")
        .env("VITRINA_BACKEND__KIND", "memory")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn slug_prints_normalized_title() {
    let output = vitrina()
        .args(["slug", "Cómo escribir un libro"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap().trim(),
        "c-mo-escribir-un-libro"
    );
}

#[test]
fn empty_store_lists_nothing() {
    let output = vitrina().args(["services", "list"]).output().unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn publishing_unknown_product_fails() {
    let output = vitrina()
        .args(["products", "publish", "missing"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("failed to update product missing"));
}
