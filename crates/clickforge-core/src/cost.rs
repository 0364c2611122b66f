//! Exponential cost growth for repeated purchases.
//!
//! The price of the `n`-th unit (0-indexed) is `floor(base * growth^n)`.
//! Batch purchases sum the per-unit prices rather than using the closed-form
//! geometric series, so buying `n` at once costs exactly what `n` single buys
//! would (the floor is applied per unit).

/// Growth rate used when the configuration does not override it.
pub const DEFAULT_GROWTH_RATE: f64 = 1.15;

/// Price of one unit when `owned` units are already held. Always integral.
pub fn unit_cost(base: f64, owned: u32, growth_rate: f64) -> f64 {
    (base * growth_rate.powf(f64::from(owned))).floor()
}

/// Total price of `quantity` units bought in one go starting at `owned`.
pub fn batch_cost(base: f64, owned: u32, quantity: u32, growth_rate: f64) -> f64 {
    batch_cost_within(base, owned, quantity, growth_rate, f64::INFINITY).unwrap_or(f64::INFINITY)
}

/// Like [`batch_cost`], but stops summing and returns `None` as soon as the
/// running total exceeds `budget`.
pub fn batch_cost_within(
    base: f64,
    owned: u32,
    quantity: u32,
    growth_rate: f64,
    budget: f64,
) -> Option<f64> {
    if base == 0.0 {
        return Some(0.0);
    }
    if growth_rate == 1.0 {
        // Flat price: every unit costs floor(base).
        let total = base.floor() * f64::from(quantity);
        return (total <= budget).then_some(total);
    }

    let mut total = 0.0;
    for i in 0..quantity {
        total += unit_cost(base, owned.saturating_add(i), growth_rate);
        if total > budget {
            return None;
        }
        if total == f64::INFINITY {
            break;
        }
    }
    Some(total)
}

/// Clamp a requested quantity against an optional max level.
///
/// Returns `None` when nothing can be bought: a zero request, or an entity
/// already at (or past) its max level.
pub fn clamp_quantity(owned: u32, requested: u32, max_level: Option<u32>) -> Option<u32> {
    let quantity = match max_level {
        Some(max) if owned.saturating_add(requested) > max => max.saturating_sub(owned),
        _ => requested,
    };
    (quantity > 0).then_some(quantity)
}
