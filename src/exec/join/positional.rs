//! PositionalJoin (spec.md §4.7): zips row-i-of-left with row-i-of-right;
//! terminates at the shorter side; no key matching at all.

use crate::exec::{check_cancelled, BoxedExecutor, ExecutionContext};
use crate::error::ExecutorError;
use crate::row::Row;
use futures::StreamExt;
use futures_async_stream::try_stream;

#[try_stream(boxed, ok = Row, error = ExecutorError)]
pub async fn positional_join(mut left: BoxedExecutor, mut right: BoxedExecutor, ctx: ExecutionContext) {
    loop {
        check_cancelled(&ctx.signal)?;
        let (l, r) = (left.next().await, right.next().await);
        match (l, r) {
            (Some(l), Some(r)) => {
                let mut joined = l?;
                joined.extend_from(&r?);
                yield joined;
            }
            _ => break,
        }
    }
}
