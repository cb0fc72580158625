use crate::{clean, db, load, progress::Progress, work};
use std::path::Path;

#[derive(argh::FromArgs)] // this struct generates the flags and --help output
/// cook, a parallel recipe build runner
struct Opts {
    /// recipe file [default=cook.recipe]
    #[argh(option, short = 'r', default = "\"cook.recipe\".into()")]
    recipe: String,

    /// parallelism [default uses system thread count]
    #[argh(option, short = 'j')]
    jobs: Option<usize>,

    /// remove declared outputs, depfiles, and the command log
    #[argh(switch)]
    clean: bool,

    /// print executed command lines
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// targets to build [default: outputs nothing consumes]
    #[argh(positional)]
    targets: Vec<String>,
}

fn default_parallelism() -> anyhow::Result<usize> {
    let par = std::thread::available_parallelism()?;
    Ok(usize::from(par))
}

pub fn run() -> anyhow::Result<i32> {
    let opts: Opts = argh::from_env();

    let recipe_path = Path::new(&opts.recipe);
    let mut graph = match load::read(recipe_path) {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("cook: {:#}", err);
            return Ok(1);
        }
    };

    if opts.clean {
        let removed = clean::clean(&mut graph)?;
        println!(
            "cook: removed {} file{}",
            removed,
            if removed == 1 { "" } else { "s" }
        );
        return Ok(0);
    }

    let max_jobs = match opts.jobs {
        Some(0) => {
            eprintln!("cook: -j must be positive");
            return Ok(1);
        }
        Some(jobs) => jobs,
        None => default_parallelism()?,
    };
    log::debug!("max_jobs={}", max_jobs);

    // Resolve target names up front; an unknown name is an argument error,
    // not a build failure.
    let targets = if opts.targets.is_empty() {
        graph.sinks()
    } else {
        let mut targets = Vec::new();
        for name in &opts.targets {
            match graph.lookup_file(name) {
                Some(id) => targets.push(id),
                None => {
                    eprintln!("cook: unknown target {:?}", name);
                    return Ok(1);
                }
            }
        }
        targets
    };

    let mut log = db::Log::open(&graph.cache_dir)?;
    let progress = Progress::new(opts.verbose);
    let options = work::Options { max_jobs };

    let mut work = work::Work::new(&mut graph, &mut log, &progress, options);
    let result = (|| {
        for id in targets {
            work.want_file(id)?;
        }
        work.run()
    })();

    match result {
        Ok(0) => println!("cook: no work to do"),
        Ok(n) => println!(
            "cook: ran {} task{}, now up to date",
            n,
            if n == 1 { "" } else { "s" }
        ),
        Err(err) => {
            let _ = log.close();
            eprintln!("cook: {:#}", err);
            return Ok(2);
        }
    }
    log.close()?;
    Ok(0)
}
