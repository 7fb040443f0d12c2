// Constant-product swap math over arbitrary-precision integers (UniswapV2, no fees)
//
// Amounts and reserves are `BigUint`: the closed form multiplies every reserve of the
// path together, which overflows any fixed-width word after a handful of hops.

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Reserves of one hop, oriented in the swap direction: `(reserve_in, reserve_out)`.
pub type HopReserves = (BigUint, BigUint);

/// Output of a single constant-product swap.
///
/// `amount_out = amount_in * reserve_out / (reserve_in + amount_in)`, truncating.
/// A pool with no input reserve and no input amount yields zero.
pub fn swap_amount_out(amount_in: &BigUint, reserve_in: &BigUint, reserve_out: &BigUint) -> BigUint {
    let denominator = reserve_in + amount_in;
    if denominator.is_zero() {
        return BigUint::zero();
    }
    amount_in * reserve_out / denominator
}

/// Output of a multi-hop swap composed into a single division.
///
/// ```text
///                    a * Π r_out
/// out = ------------------------------------------------
///        Π r_in + a * Σ_i ( Π_{j<i} r_out_j * Π_{j>i} r_in_j )
/// ```
///
/// Equal bit-for-bit to [`chain_amount_out_iterative`]; both truncate once, at the end.
pub fn chain_amount_out(amount_in: &BigUint, hops: &[HopReserves]) -> BigUint {
    if hops.is_empty() {
        return BigUint::zero();
    }

    let product_in = product(hops.iter().map(|(r_in, _)| r_in));
    let product_out = product(hops.iter().map(|(_, r_out)| r_out));

    let mut sum = BigUint::zero();
    for i in 0..hops.len() {
        let before = product(hops[..i].iter().map(|(_, r_out)| r_out));
        let after = product(hops[i + 1..].iter().map(|(r_in, _)| r_in));
        sum += before * after;
    }

    let denominator = product_in + amount_in * sum;
    if denominator.is_zero() {
        return BigUint::zero();
    }
    amount_in * product_out / denominator
}

/// Output of a multi-hop swap applying the single-hop formula hop by hop.
///
/// The intermediate amount is carried as an exact fraction `n / d`: hop `(r_in, r_out)`
/// maps it to `n * r_out / (r_in * d + n)`. Only the final amount is truncated, which is
/// what keeps this in exact agreement with [`chain_amount_out`].
pub fn chain_amount_out_iterative(amount_in: &BigUint, hops: &[HopReserves]) -> BigUint {
    if hops.is_empty() {
        return BigUint::zero();
    }

    let mut numerator = amount_in.clone();
    let mut denominator = BigUint::one();
    for (reserve_in, reserve_out) in hops {
        let next_denominator = reserve_in * &denominator + &numerator;
        numerator *= reserve_out;
        denominator = next_denominator;
    }

    if denominator.is_zero() {
        return BigUint::zero();
    }
    numerator / denominator
}

/// Amount a sequence of real swaps delivers: every hop truncates its own output.
///
/// Never above [`chain_amount_out`]; the gap is the rounding lost at each
/// intermediate token.
pub fn chain_amount_out_per_hop(amount_in: &BigUint, hops: &[HopReserves]) -> BigUint {
    if hops.is_empty() {
        return BigUint::zero();
    }

    hops.iter().fold(amount_in.clone(), |amount, (reserve_in, reserve_out)| {
        swap_amount_out(&amount, reserve_in, reserve_out)
    })
}

/// Product of all values; one for an empty sequence.
pub fn product<'a>(values: impl IntoIterator<Item = &'a BigUint>) -> BigUint {
    values.into_iter().fold(BigUint::one(), |acc, value| acc * value)
}
