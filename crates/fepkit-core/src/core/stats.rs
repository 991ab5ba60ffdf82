//! Statistical helpers for exponential averaging.
//!
//! Energies are in kcal/mol and temperatures in Kelvin throughout.

/// Boltzmann constant in kcal/(mol·K).
pub const BOLTZMANN_KCAL_MOL: f64 = 0.0019872041;

pub fn kt(temperature: f64) -> f64 {
    BOLTZMANN_KCAL_MOL * temperature
}

/// Mean of `exp(-ΔE / kT)` over the samples, or `None` for an empty slice.
pub fn thermodynamic_average(energies: &[f64], temperature: f64) -> Option<f64> {
    if energies.is_empty() {
        return None;
    }
    let beta = 1.0 / kt(temperature);
    let sum: f64 = energies.iter().map(|e| (-e * beta).exp()).sum();
    Some(sum / energies.len() as f64)
}

/// Zwanzig free energy `-kT ln(avg)` for a thermodynamic average.
pub fn zwanzig(thermodynamic_average: f64, temperature: f64) -> f64 {
    -kt(temperature) * thermodynamic_average.ln()
}

/// Exponential-average free energy of a sample set, or `None` when empty.
///
/// The exponentials are taken relative to the lowest energy, so large
/// differences neither overflow nor underflow:
/// `ΔG = m - kT ln(mean(exp(-(ΔE - m) / kT)))` with `m = min(ΔE)`.
pub fn free_energy(energies: &[f64], temperature: f64) -> Option<f64> {
    let min_energy = energies.iter().copied().reduce(f64::min)?;
    let beta = 1.0 / kt(temperature);
    let sum: f64 = energies
        .iter()
        .map(|&e| (-(e - min_energy) * beta).exp())
        .sum();
    let shifted_average = sum / energies.len() as f64;
    Some(min_energy + zwanzig(shifted_average, temperature))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator); zero for fewer than two values.
pub fn standard_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (squares / (values.len() - 1) as f64).sqrt()
}

pub fn standard_error_of_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    standard_deviation(values) / (values.len() as f64).sqrt()
}

/// Root of the sum of squares, used to combine independent errors.
pub fn root_sum_square(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().map(|v| v * v).sum::<f64>().sqrt()
}
