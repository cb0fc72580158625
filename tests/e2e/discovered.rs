//! Tests for depfile-discovered dependencies.

use crate::*;

const EMIT_RULE: &str = "rule emit
\tdescription emit $out
\tcommand touch $out
\tdepfile $out.d
\tdeps gcc

";

#[test]
fn discovered_deps_are_logged_and_tracked() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!("{}build emit\n\tinput in\n\toutput out\n", EMIT_RULE),
    )?;
    space.write("in", "")?;
    space.write("hdr", "")?;
    // The "compiler" output: a depfile naming a dep the recipe never listed.
    space.write("out.d", "out: in hdr\n")?;

    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "ran 1 task");
    let log = String::from_utf8(space.read(".cook_log")?)?;
    assert!(log.contains("hdr"), "log should record hdr, got:\n{}", log);

    // Nothing changed: no work.
    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "no work to do");

    // Touching the discovered dep triggers a rebuild even though the
    // recipe never mentions it.
    tick();
    space.write("hdr", "changed")?;
    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "ran 1 task");
    Ok(())
}

#[test]
fn gcc_deps_require_a_depfile() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    // deps gcc but the command never writes the depfile.
    space.write(
        "cook.recipe",
        &format!("{}build emit\n\tinput in\n\toutput out\n", EMIT_RULE),
    )?;
    space.write("in", "")?;
    let out = space.run(&mut cook_command(vec!["out"]))?;
    assert_eq!(out.status.code(), Some(2));
    assert_stderr_contains(&out, "out.d");
    Ok(())
}

/// The msvc/dmd tags are reserved: accepted, but no deps are captured.
#[test]
fn reserved_deps_formats_capture_nothing() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        "rule emit
\tdescription emit $out
\tcommand touch $out
\tdeps msvc

build emit
\tinput in
\toutput out
",
    )?;
    space.write("in", "")?;
    space.run_expect(&mut cook_command(vec!["out"]))?;
    let log = String::from_utf8(space.read(".cook_log")?)?;
    assert!(log.contains("out"), "log has an entry for out:\n{}", log);

    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "no work to do");
    Ok(())
}
