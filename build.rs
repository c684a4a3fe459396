use anyhow::Result;
use vergen::EmitBuilder;

fn main() -> Result<()> {
    // git branch and hash for the startup message, if available
    let _ = EmitBuilder::builder()
        .git_branch()
        .git_sha(true)
        .fail_on_error()
        .quiet()
        .emit();
    Ok(())
}
