mod clean;
pub mod db;
mod depfile;
mod eval;
pub mod fs;
pub mod graph;
mod hash;
mod idvec;
pub mod load;
pub mod progress;
pub mod recipe;
pub mod run;
mod scanner;
mod smallmap;
mod state;
mod task;
pub mod work;

#[cfg(not(windows))]
use jemallocator::Jemalloc;

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
