use crate::prediction::Probabilities;

/// Returned when the model sends three zeros.
pub const ZERO_SUM_FALLBACK: Probabilities = Probabilities {
    local: 33,
    draw: 34,
    visitor: 33,
};

/// Rescale a raw (local, draw, visitor) triple to whole percentages summing
/// to exactly 100.
///
/// Inputs must be non-negative. Local and draw are rounded
/// independently and visitor takes whatever is left, so the total is exact by
/// construction.
pub fn normalize_probabilities(local: f64, draw: f64, visitor: f64) -> Probabilities {
    let sum = local + draw + visitor;

    if sum == 100.0 && [local, draw, visitor].iter().all(|v| v.fract() == 0.0) {
        return Probabilities {
            local: local as u8,
            draw: draw as u8,
            visitor: visitor as u8,
        };
    }

    let max = local.max(draw).max(visitor);
    if max <= 0.0 || !max.is_finite() {
        return ZERO_SUM_FALLBACK;
    }

    // Subnormal or overflowing sums are rescaled by the largest component
    // first, so the factor stays finite.
    let (local, draw, visitor) = if sum.is_finite() && (100.0 / sum).is_finite() {
        (local, draw, visitor)
    } else {
        (local / max, draw / max, visitor / max)
    };
    let factor = 100.0 / (local + draw + visitor);
    let share = |v: f64| ((v * factor).round() as i64).clamp(0, 100);
    let mut adjusted_local = share(local);
    let mut adjusted_draw = share(draw);

    // Two half-up roundings can overshoot by one; visitor cannot go negative.
    let overflow = adjusted_local + adjusted_draw - 100;
    if overflow > 0 {
        if adjusted_local >= adjusted_draw {
            adjusted_local -= overflow;
        } else {
            adjusted_draw -= overflow;
        }
    }
    let adjusted_visitor = 100 - adjusted_local - adjusted_draw;

    Probabilities {
        local: adjusted_local as u8,
        draw: adjusted_draw as u8,
        visitor: adjusted_visitor as u8,
    }
}

pub fn is_normalized(p: &Probabilities) -> bool {
    p.total() == 100
}
