use crate::*;

#[test]
fn empty_recipe() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("cook.recipe", "")?;
    let out = space.run_expect(&mut cook_command(vec![]))?;
    assert_output_contains(&out, "cook: no work to do");
    Ok(())
}

#[test]
fn basic_build() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!("{}build touch\n\tinput in\n\toutput out\n", TOUCH_RULE),
    )?;
    space.write("in", "")?;
    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert!(space.read("out").is_ok());
    assert_output_contains(&out, "touch out");
    assert_output_contains(&out, "ran 1 task");
    Ok(())
}

/// Running a successful build twice spawns nothing the second time.
#[test]
fn second_run_is_noop() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!("{}build touch\n\tinput in\n\toutput out\n", TOUCH_RULE),
    )?;
    space.write("in", "")?;
    space.run_expect(&mut cook_command(vec!["out"]))?;
    let out = space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_output_contains(&out, "cook: no work to do");
    Ok(())
}

#[test]
fn default_targets_are_sinks() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!(
            "{}build touch\n\tinput in\n\toutput mid\n\n\
             build touch\n\tinput mid\n\toutput out\n",
            TOUCH_RULE
        ),
    )?;
    space.write("in", "")?;
    let out = space.run_expect(&mut cook_command(vec![]))?;
    assert!(space.read("mid").is_ok());
    assert!(space.read("out").is_ok());
    assert_output_contains(&out, "ran 2 tasks");
    Ok(())
}

#[test]
fn specify_recipe_file() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "other.recipe",
        &format!("{}build touch\n\tinput in\n\toutput out\n", TOUCH_RULE),
    )?;
    space.write("in", "")?;
    space.run_expect(&mut cook_command(vec!["-r", "other.recipe", "out"]))?;
    assert!(space.read("out").is_ok());
    Ok(())
}

/// Recipe paths are relative to the recipe's directory, not the CWD.
#[test]
fn recipe_in_subdir_is_rebased() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.mkdir("sub")?;
    space.write(
        "sub/build.recipe",
        &format!("{}build touch\n\tinput in\n\toutput out\n", TOUCH_RULE),
    )?;
    space.write("sub/in", "")?;
    space.run_expect(&mut cook_command(vec!["-r", "sub/build.recipe"]))?;
    assert!(space.exists("sub/out"));
    // The command log lands next to the recipe, not in the CWD.
    assert!(space.exists("sub/.cook_log"));
    assert!(!space.exists(".cook_log"));
    Ok(())
}

#[test]
fn cache_dir_holds_the_log() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.mkdir("cache")?;
    space.write(
        "cook.recipe",
        &format!(
            "{}build touch\n\tinput in\n\toutput out\n\ncacheDir cache\n",
            TOUCH_RULE
        ),
    )?;
    space.write("in", "")?;
    space.run_expect(&mut cook_command(vec!["out"]))?;
    assert!(space.exists("cache/.cook_log"));
    assert!(!space.exists(".cook_log"));
    Ok(())
}

#[test]
fn verbose_prints_command_lines() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!("{}build touch\n\tinput in\n\toutput out\n", TOUCH_RULE),
    )?;
    space.write("in", "")?;
    let out = space.run_expect(&mut cook_command(vec!["-v", "out"]))?;
    assert_output_contains(&out, "touch out");
    Ok(())
}

/// Build-local bindings shadow recipe-level ones during expansion.
#[test]
fn binding_lookup_order() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        "rule note
\tdescription note $tag $out
\tcommand touch $out

build note
\toutput plain

build note
\toutput special
\tbinding tag = local

binding tag = global
",
    )?;
    let out = space.run_expect(&mut cook_command(vec![]))?;
    assert_output_contains(&out, "note global plain");
    assert_output_contains(&out, "note local special");
    Ok(())
}

/// Three independent edges fan into one final edge; the final edge only
/// runs after all three complete, under a budget of two.
#[test]
fn parallel_fan_in() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        &format!(
            "{}build touch\n\tinput in\n\toutput a.o\n\n\
             build touch\n\tinput in\n\toutput b.o\n\n\
             build touch\n\tinput in\n\toutput c.o\n\n\
             build touch\n\tinput a.o\n\tinput b.o\n\tinput c.o\n\toutput lib\n",
            TOUCH_RULE
        ),
    )?;
    space.write("in", "")?;
    let out = space.run_expect(&mut cook_command(vec!["-j", "2", "lib"]))?;
    assert!(space.read("lib").is_ok());
    assert_output_contains(&out, "ran 4 tasks");

    // All four are up to date afterwards.
    let out = space.run_expect(&mut cook_command(vec!["-j", "2", "lib"]))?;
    assert_output_contains(&out, "no work to do");
    Ok(())
}

/// An edge whose jobs cost exceeds the whole budget still runs, alone.
#[test]
fn oversize_edge_runs_alone() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        "rule heavy
\tdescription heavy $out
\tcommand touch $out
\tjobs 8

build heavy
\toutput big

build heavy
\toutput big2
",
    )?;
    let out = space.run_expect(&mut cook_command(vec!["-j", "2"]))?;
    assert!(space.exists("big"));
    assert!(space.exists("big2"));
    assert_output_contains(&out, "ran 2 tasks");
    Ok(())
}

/// A path with a space travels through $in expansion and the worker's
/// tokenizer as one argument.
#[test]
fn path_with_space() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "cook.recipe",
        "rule copy
\tdescription copy $in
\tcommand cp $in $out

build copy
\tinput my file
\toutput out
",
    )?;
    space.write("my file", "payload")?;
    space.run_expect(&mut cook_command(vec!["out"]))?;
    assert_eq!(space.read("out")?, b"payload");
    Ok(())
}
