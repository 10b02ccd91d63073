/* src/core/src/middleware.rs */

use crate::context::Ctx;
use crate::errors::PyraError;
use crate::module::{BoxFuture, MiddlewareFn, NextFn};
use crate::response::Response;

/// Compose an ordered middleware chain around a terminal handler and run
/// it: classic onion composition. The chain is wrapped innermost first, so
/// `middleware[0]` is the outermost frame and sees the request first.
///
/// A middleware that returns without calling its continuation
/// short-circuits everything inside it. An error propagates straight to
/// the caller; ancestor middleware never re-wrap the failure.
pub fn run_chain(
  ctx: Ctx,
  middleware: Vec<MiddlewareFn>,
  terminal: NextFn,
) -> BoxFuture<Result<Response, PyraError>> {
  let mut next = terminal;
  for mw in middleware.into_iter().rev() {
    let inner = next;
    let mw_ctx = ctx.clone();
    next = Box::new(move || mw(mw_ctx, inner));
  }
  next()
}

/// Flush pending `Set-Cookie` values into the response. Called exactly
/// once, after the whole chain has returned.
pub fn flush_cookies(ctx: &Ctx, response: &mut Response) {
  for cookie in ctx.drain_set_cookies() {
    response.append_header("Set-Cookie", &cookie);
  }
}
