//! Comment confidence: the lower bound of the Wilson score interval.
//!
//! Used only to order replies within a thread, never to gate anything.

/// One-sided 90% z-value.
pub const CONFIDENCE_Z: f64 = 1.281551565545;

/// Lower bound of the Wilson score interval for `upvotes` positive ratings
/// out of `upvotes + downvotes`. Returns 0 when there are no votes.
///
/// At a fixed number of downvotes the bound strictly increases with upvotes;
/// at a fixed positive ratio it increases with the number of votes.
pub fn confidence(upvotes: u32, downvotes: u32) -> f64 {
  let n = f64::from(upvotes) + f64::from(downvotes);
  if n == 0.0 {
    return 0.0;
  }

  let z = CONFIDENCE_Z;
  let z2 = z * z;
  let p = f64::from(upvotes) / n;

  let left = p + z2 / (2.0 * n);
  let right = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();
  let under = 1.0 + z2 / n;

  // All-downvote comments land on zero up to rounding error.
  ((left - right) / under).max(0.0)
}
