use vergen_gix::{BuildBuilder, Emitter, GixBuilder};

// Emits VERGEN_BUILD_TIMESTAMP and VERGEN_GIT_SHA for the `version` subcommand.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let build = BuildBuilder::default().build_timestamp(true).build()?;
    let git = GixBuilder::default().sha(true).build()?;

    Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&git)?
        .emit()?;

    Ok(())
}
