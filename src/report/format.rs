//! Formatted terminal output.
//!
//! Lengths are shown in nm and forces in pN; everything else in the crate
//! stays in SI units.

use crate::domain::{ModelKind, PolymerFit, PolymerParams, PolymerSettings};
use crate::report::{BatchSummary, PointResidual, recovery};

/// Format a single fit: model, parameters, convergence and (optionally) the truth.
pub fn format_fit_summary(fit: &PolymerFit, settings: &PolymerSettings, truth: Option<&PolymerParams>) -> String {
    let mut out = String::new();
    let kind = fit.model;
    let d = &fit.diagnostics;

    out.push_str(&format!("=== pfit - {} fit ===\n", kind.display_name()));
    out.push_str(&format!("Temperature: {:.2} K\n", settings.temperature));
    match settings.secondary_length(kind) {
        Some(v) => out.push_str(&format!("{}: fixed at {}\n", capitalize(kind.secondary_name()), fmt_nm(v))),
        None => out.push_str(&format!("{}: free\n", capitalize(kind.secondary_name()))),
    }
    if kind == ModelKind::FjcPeg {
        out.push_str(&format!(
            "PEG segment: k={:.1} N/m, dG={:.2} kBT, Lp={}, Lh={}\n",
            settings.peg.elasticity,
            settings.peg.delta_g,
            fmt_nm(settings.peg.planar_length),
            fmt_nm(settings.peg.helical_length)
        ));
    }

    out.push_str("\nFitted parameters:\n");
    out.push_str(&format!(
        "- {:<19} {}\n",
        kind.primary_name(),
        fmt_primary(kind, fit.params.primary())
    ));
    out.push_str(&format!("- {:<19} {}\n", kind.secondary_name(), fmt_nm(fit.params.secondary())));
    if let Some(se) = &d.standard_errors {
        out.push_str(&format!("- std errors (fit)   {}\n", fmt_vec(se)));
    }

    if let Some(truth) = truth {
        let r = recovery(&fit.params, truth);
        out.push_str(&format!(
            "- truth               {} / {} (error {:+.3}% / {:+.3}%)\n",
            fmt_primary(kind, truth.primary()),
            fmt_nm(truth.secondary()),
            100.0 * r.primary,
            100.0 * r.secondary
        ));
    }

    out.push_str("\nConvergence:\n");
    out.push_str(&format!("- status: {:?} ({})\n", d.status, d.status.message()));
    out.push_str(&format!(
        "- iterations={} evaluations={}\n",
        d.iterations, d.evaluations
    ));
    out.push_str(&format!("- RMSE={} SSE={:.3e} N^2\n", fmt_pn(d.rmse), d.sse));
    if let Some(q) = d.quality {
        out.push_str(&format!("- quality (RMSE / noise) = {q:.3}\n"));
    }
    out.push_str(&format!("- free params: {}\n", fmt_vec(&d.fit_params)));

    out
}

/// Format the residual table.
pub fn format_residual_table(rows: &[PointResidual]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>6} {:>10} {:>12} {:>12} {:>12}", "index", "x_nm", "F_obs_pN", "F_fit_pN", "resid_pN").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<6} {:-<10} {:-<12} {:-<12} {:-<12}", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:>6} {:>10.3} {:>12.3} {:>12.3} {:>12.3}",
                r.index,
                r.x * 1e9,
                r.y_obs * 1e12,
                r.y_fit * 1e12,
                r.residual * 1e12
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Format batch recovery statistics.
pub fn format_batch_summary(kind: ModelKind, truth: &PolymerParams, summary: &BatchSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== pfit - {} batch ===\n", kind.display_name()));
    out.push_str(&format!(
        "Truth: {} = {}, {} = {}\n",
        kind.primary_name(),
        fmt_primary(kind, truth.primary()),
        kind.secondary_name(),
        fmt_nm(truth.secondary())
    ));
    out.push_str(&format!("Fits: {} ({} failed)\n", summary.fits, summary.failures));
    out.push_str(&format!(
        "{} error: mean {:+.3}% std {:.3}%\n",
        capitalize(kind.primary_name()),
        100.0 * summary.primary_mean,
        100.0 * summary.primary_std
    ));
    out.push_str(&format!(
        "{} error: mean {:+.3}% std {:.3}%\n",
        capitalize(kind.secondary_name()),
        100.0 * summary.secondary_mean,
        100.0 * summary.secondary_std
    ));
    out.push_str(&format!("Mean RMSE: {}\n", fmt_pn(summary.mean_rmse)));
    out
}

fn fmt_primary(kind: ModelKind, v: f64) -> String {
    match kind {
        ModelKind::Wlc | ModelKind::Fjc => fmt_nm(v),
        ModelKind::FjcPeg => format!("{v:.2}"),
    }
}

fn fmt_nm(v: f64) -> String {
    format!("{:.4} nm", v * 1e9)
}

fn fmt_pn(v: f64) -> String {
    format!("{:.4} pN", v * 1e12)
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6e}")).collect();
    format!("[{}]", parts.join(", "))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
