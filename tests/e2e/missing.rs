//! Tests for behavior around missing files and malformed recipes.

use crate::*;

#[test]
fn missing_recipe_is_argument_error() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.run(&mut cook_command(vec![]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "cook.recipe");
    Ok(())
}

#[test]
fn missing_input_fails_the_build() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!("{}build touch\n\tinput in\n\toutput out\n", TOUCH_RULE),
    )?;
    let out = space.run(&mut cook_command(vec!["out"]))?;
    assert_eq!(out.status.code(), Some(2));
    assert_stderr_contains(&out, "input in missing");
    Ok(())
}

#[test]
fn unknown_target_is_argument_error() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!("{}build touch\n\tinput in\n\toutput out\n", TOUCH_RULE),
    )?;
    let out = space.run(&mut cook_command(vec!["nonesuch"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "unknown target");
    Ok(())
}

#[test]
fn unknown_rule_fails_the_load() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("cook.recipe", "build nonesuch\n\toutput out\n")?;
    let out = space.run(&mut cook_command(vec![]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "unknown rule");
    Ok(())
}

#[test]
fn parse_error_names_file_and_line() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("cook.recipe", "rule touch\n\tfrobnicate yes\n")?;
    let out = space.run(&mut cook_command(vec![]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "parse error");
    assert_stderr_contains(&out, "cook.recipe:2");
    Ok(())
}

#[test]
fn duplicate_producer_fails_the_load() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!(
            "{}build touch\n\tinput in\n\toutput out\n\n\
             build touch\n\tinput in\n\toutput out\n",
            TOUCH_RULE
        ),
    )?;
    let out = space.run(&mut cook_command(vec![]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_stderr_contains(&out, "more than one build");
    Ok(())
}

/// A dependency cycle never becomes ready and is reported rather than hung.
#[test]
fn cycle_is_reported() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!(
            "{}build touch\n\tinput b\n\toutput a\n\n\
             build touch\n\tinput a\n\toutput b\n",
            TOUCH_RULE
        ),
    )?;
    let out = space.run(&mut cook_command(vec!["a"]))?;
    assert_eq!(out.status.code(), Some(2));
    assert_stderr_contains(&out, "no progress possible");
    Ok(())
}
