//! Join operators (spec.md §4.7): one file per strategy, all producing
//! the same `BoxedExecutor` shape so `exec::execute` can treat them
//! uniformly.

mod hash;
mod nested_loop;
mod positional;

pub(crate) use hash::hash_join;
pub(crate) use nested_loop::nested_loop_join;
pub(crate) use positional::positional_join;
