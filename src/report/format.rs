//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the reduction/fitting code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::AnalysisRun;

/// Format the full run summary (source + reduction + fit).
pub fn format_run_summary(run: &AnalysisRun) -> String {
    let src = &run.source;
    let res = &run.output;
    let geometry = &run.options.geometry;
    let mut out = String::new();

    out.push_str("=== torque - Ic(θ) reduction ===\n");
    out.push_str(&format!("Source: {}\n", src.label));
    if let Some(layout) = src.layout {
        out.push_str(&format!(
            "Rows: {} used / {} read ({} rejected) | layout: {}\n",
            src.rows_used,
            src.rows_read,
            src.row_errors,
            layout.display_name()
        ));
    }
    match src.reversal {
        Some(r) => out.push_str(&format!("Reversal at index {r}\n")),
        None => out.push_str("Reversal: none (angle never decreases)\n"),
    }
    out.push_str(&format!(
        "Cutoff: [{}, {}) | cleaned samples: {} ({} duplicate angle(s) removed)\n",
        res.cutoff.left,
        res.cutoff.right,
        res.cleaned.len(),
        res.cutoff.span() - res.cleaned.len()
    ));

    out.push_str(&format!(
        "Sample: w={:.3} mm, l={:.3} mm | probe {} (coeff {})\n",
        geometry.width() * 1e3,
        geometry.length() * 1e3,
        geometry.probe().id(),
        geometry.probe_coefficient()
    ));
    out.push_str(&format!("icScale: {:.6e}\n", res.ic_scale));
    out.push_str(&format!("Mean field: {:.4} T", res.mean_field));
    if let Some(t) = src.mean_temperature {
        out.push_str(&format!(" | mean temperature: {t:.2} K"));
    }
    out.push('\n');

    out.push_str(&format!(
        "Baseline: slope={:.4e} V/deg | peak at raw angle {:.3}°\n",
        res.corrected.baseline_slope, res.corrected.peak_angle
    ));

    let curve = &res.curve;
    let peak = curve.ic.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if let (Some(first), Some(last)) = (curve.angle.first(), curve.angle.last()) {
        out.push_str(&format!(
            "Ic curve: n={} | angle=[{first:.2}, {last:.2}]° | peak Ic={peak:.4} mA\n",
            curve.len()
        ));
    }

    let fit = &res.fit;
    let p = fit.params;
    out.push_str(&format!(
        "\nLorentz fit over ({:.0}°, {:.0}°):\n",
        run.options.fit_window.lo, run.options.fit_window.hi
    ));
    out.push_str(&format!("  i01    = {:>12.6}\n", p.i01));
    out.push_str(&format!("  gamma1 = {:>12.6}\n", p.gamma1));
    out.push_str(&format!("  i02    = {:>12.6}\n", p.i02));
    out.push_str(&format!("  gamma2 = {:>12.6}\n", p.gamma2));
    out.push_str(&format!(
        "  n={} | rmse={:.4e} mA | evaluations={}\n",
        fit.n_points, fit.rmse, fit.evaluations
    ));

    out
}
