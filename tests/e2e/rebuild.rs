//! Tests for when work re-runs: input changes, command changes, failures.

use crate::*;

#[test]
fn touched_input_rebuilds() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!("{}build touch\n\tinput in\n\toutput out\n", TOUCH_RULE),
    )?;
    space.write("in", "")?;
    space.run_expect(&mut cook_command(vec!["out"]))?;

    tick();
    space.write("in", "changed")?;
    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "ran 1 task");
    Ok(())
}

/// Changing a command (here via a recipe binding) changes its hash and
/// forces a rebuild even though all mtimes are fresh.
#[test]
fn changed_command_rebuilds() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let recipe = |flag: &str| {
        format!(
            "rule touch\n\tdescription touch $out\n\tcommand touch {}$out\n\n\
             build touch\n\tinput in\n\toutput out\n",
            flag
        )
    };
    space.write("cook.recipe", &recipe(""))?;
    space.write("in", "")?;
    space.run_expect(&mut cook_command(vec!["out"]))?;

    space.write("cook.recipe", &recipe("-a "))?;
    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "ran 1 task");

    // And the new command is now cached as up to date.
    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "no work to do");
    Ok(())
}

/// Only the subgraph downstream of a change re-runs.
#[test]
fn unrelated_edges_stay_cached() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!(
            "{}build touch\n\tinput a\n\toutput a.o\n\n\
             build touch\n\tinput b\n\toutput b.o\n",
            TOUCH_RULE
        ),
    )?;
    space.write("a", "")?;
    space.write("b", "")?;
    space.run_expect(&mut cook_command(vec![]))?;

    tick();
    space.write("a", "changed")?;
    let out = space.run_expect(&mut cook_command(vec![]))?;
    assert_output_contains(&out, "ran 1 task");
    assert_output_contains(&out, "touch a.o");
    Ok(())
}

/// A failing command surfaces its description, command, and exit code;
/// the failed edge gets no log entry and re-runs next time, while
/// unrelated edges complete and stay cached.
#[test]
fn failure_reports_and_is_not_cached() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!(
            "{}{}build fail\n\toutput bad\n\n\
             build touch\n\tinput in\n\toutput good\n",
            TOUCH_RULE, FAIL_RULE
        ),
    )?;
    space.write("in", "")?;

    let out = space.run(&mut cook_command(vec!["-j", "2"]))?;
    assert_eq!(out.status.code(), Some(2));
    assert_output_contains(&out, "failed: fail bad");
    assert_stderr_contains(&out, "exit code: 1");
    assert_stderr_contains(&out, "false");

    // The unrelated edge was permitted to finish.
    assert!(space.exists("good"));
    let log = String::from_utf8(space.read(".cook_log")?)?;
    assert!(!log.contains("bad"), "no entry for failed output:\n{}", log);

    // Re-running retries only the failed edge.
    let out = space.run(&mut cook_command(vec!["-j", "2"]))?;
    assert_eq!(out.status.code(), Some(2));
    assert_output_contains(&out, "failed: fail bad");
    Ok(())
}

/// An order-only input is built first but does not dirty its consumer.
#[test]
fn order_only_inputs_sequence_but_do_not_dirty() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!(
            "{}build touch\n\tinput gen.src\n\toutput gen\n\n\
             build touch\n\tinput in\n\torderOnlyInput gen\n\toutput out\n",
            TOUCH_RULE
        ),
    )?;
    space.write("in", "")?;
    space.write("gen.src", "")?;
    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "ran 2 tasks");

    // A stale order-only producer alone does not dirty the consumer, and
    // an up-to-date target plans nothing at all.
    tick();
    space.write("gen.src", "stale")?;
    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "no work to do");

    // Once the consumer itself must re-run, the stale producer is brought
    // up to date first.
    tick();
    space.write("in", "changed")?;
    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "ran 2 tasks");
    Ok(())
}
