use vergen_gitcl::{Emitter, GitclBuilder};

/// `--version` shows the git branch and commit. Outside of a checkout vergen emits placeholders instead.
fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");

    let git = GitclBuilder::default().branch(true).sha(true).build()?;
    Emitter::default().add_instructions(&git)?.emit()?;
    Ok(())
}
