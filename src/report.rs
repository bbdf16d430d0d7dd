//! Presentation of an `AnalysisReport`
//!
//! Three outputs over the same structured record:
//! - `render_text`: terminal summary
//! - `render_markdown`: decision report for humans
//! - `to_json`: metrics record for dashboards

use crate::decision::Recommendation;
use crate::inference::{PowerStatus, SegmentStatus, TestResult};
use crate::pipeline::AnalysisReport;

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn pct_fine(value: f64) -> String {
    format!("{:.4}%", value * 100.0)
}

fn relative(test: &TestResult) -> String {
    match test.relative_lift {
        Some(lift) => format!("{:+.2}%", lift * 100.0),
        None => "n/a".to_string(),
    }
}

fn headline(recommendation: Recommendation) -> &'static str {
    match recommendation {
        Recommendation::Ship => "✅ SHIP TREATMENT",
        Recommendation::Hold => "❌ HOLD: INVESTIGATE ASSIGNMENT",
        Recommendation::KeepCurrent => "⚠️  KEEP CURRENT DESIGN",
    }
}

/// Terminal summary
pub fn render_text(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let test = &report.test;

    out.push_str(&format!("{}\n\n", headline(report.decision.recommendation)));

    for warning in &report.decision.warnings {
        out.push_str(&format!("⚠️  {}\n", warning));
    }
    if !report.decision.warnings.is_empty() {
        out.push('\n');
    }

    out.push_str("🧹 Data cleaning:\n");
    let cleaning = &report.cleaning;
    out.push_str(&format!(
        "  raw events {}, removed {} ({:.2}%), clean users {}\n",
        cleaning.raw_events,
        cleaning.removed_records(),
        cleaning.pct_removed(),
        cleaning.clean_records
    ));
    out.push_str(&format!(
        "  missing fields {}, mismatched assignments {}, duplicates {}, no country {}\n",
        cleaning.missing_fields,
        cleaning.mismatched_assignments,
        cleaning.duplicates_removed,
        cleaning.unmatched_country
    ));

    out.push_str("\n👥 Groups:\n");
    for arm in [&report.control, &report.treatment] {
        out.push_str(&format!(
            "  {:<9} n={:<8} conversions={:<7} rate={}\n",
            arm.group.as_str(),
            arm.n,
            arm.conversions,
            pct(arm.rate)
        ));
    }

    let srm = &report.srm;
    out.push_str(&format!(
        "\n{} SRM check: chi2={:.3}, p={:.4} (alpha {})\n",
        if srm.passed { "✅" } else { "❌" },
        srm.chi_square,
        srm.p_value,
        srm.srm_alpha
    ));

    out.push_str("\n📊 Two-proportion Z-test:\n");
    out.push_str(&format!(
        "  lift {} (relative {}), z={:.4}, p={:.4}\n",
        pct_fine(test.absolute_lift),
        relative(test),
        test.z_statistic,
        test.p_value
    ));
    out.push_str(&format!(
        "  {:.0}% CI [{}, {}], Cohen's h={:.4} ({})\n",
        test.confidence_level() * 100.0,
        pct_fine(test.ci_low),
        pct_fine(test.ci_high),
        test.effect_size_h,
        test.effect_magnitude
    ));

    out.push_str("\n⚡ Power:\n");
    match &report.power {
        PowerStatus::Computed { result: power } => {
            out.push_str(&format!(
                "  achieved {:.1}% (target {:.0}%), required n/group {} for MDE {}\n",
                power.achieved_power * 100.0,
                power.power_target * 100.0,
                power.required_n_per_group,
                pct(power.mde_absolute)
            ));
            if let Some(mde) = power.detectable_mde {
                out.push_str(&format!(
                    "  detectable lift at n/group {}: {}\n",
                    power.n_per_group,
                    pct_fine(mde)
                ));
            }
        }
        PowerStatus::Unavailable { reason } => {
            out.push_str(&format!("  n/a ({})\n", reason));
        }
    }

    let bayes = &report.bayesian;
    out.push_str("\n🎲 Bayesian:\n");
    out.push_str(&format!(
        "  P(treatment better)={:.2}%, expected lift {}, 95% credible [{}, {}]\n",
        bayes.p_treatment_better * 100.0,
        pct_fine(bayes.expected_lift),
        pct_fine(bayes.lift_credible_interval.0),
        pct_fine(bayes.lift_credible_interval.1)
    ));

    let segments = &report.segments;
    if !segments.segments.is_empty() {
        out.push_str(&format!(
            "\n🗂  Segments by {} (Bonferroni alpha {:.4}):\n",
            segments.key, segments.corrected_alpha
        ));
        for segment in &segments.segments {
            match &segment.status {
                SegmentStatus::Tested {
                    result,
                    holm_adjusted_p_value,
                } => out.push_str(&format!(
                    "  {:<6} n={:<8} lift {:<10} p={:.4} holm={:.4}{}\n",
                    segment.label,
                    segment.n_users,
                    pct_fine(result.absolute_lift),
                    result.p_value,
                    holm_adjusted_p_value,
                    if result.reject_null { " *" } else { "" }
                )),
                SegmentStatus::Excluded { reason } => out.push_str(&format!(
                    "  {:<6} n={:<8} excluded: {}\n",
                    segment.label, segment.n_users, reason
                )),
            }
        }
    }

    if !report.impact.is_empty() {
        out.push_str("\n💰 Impact:\n");
        for estimate in &report.impact {
            out.push_str(&format!(
                "  {}: {:.2}/month, {:.2}/year\n",
                estimate.scenario, estimate.monthly_revenue_impact, estimate.yearly_revenue_impact
            ));
        }
    }

    out.push_str("\n📝 Rationale:\n");
    for line in &report.decision.rationale {
        out.push_str(&format!("  - {}\n", line));
    }
    out.push_str(&format!("\nsample fingerprint: {}\n", report.sample_fingerprint));

    out
}

/// Decision report in Markdown
pub fn render_markdown(report: &AnalysisReport) -> String {
    let mut md = String::new();
    let test = &report.test;

    md.push_str("# A/B Test Decision Report\n\n");
    md.push_str(&format!(
        "**Recommendation:** `{}`\n\n",
        report.decision.recommendation
    ));

    if !report.decision.warnings.is_empty() {
        md.push_str("## Warnings\n\n");
        for warning in &report.decision.warnings {
            md.push_str(&format!("> **{}**\n>\n", warning));
        }
        md.push('\n');
    }

    md.push_str("## Rationale\n\n");
    for line in &report.decision.rationale {
        md.push_str(&format!("- {}\n", line));
    }

    md.push_str("\n## Sample\n\n");
    md.push_str("| Group | Users | Conversions | Rate |\n");
    md.push_str("|---|---:|---:|---:|\n");
    for arm in [&report.control, &report.treatment] {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            arm.group,
            arm.n,
            arm.conversions,
            pct(arm.rate)
        ));
    }
    md.push_str(&format!(
        "\n{} of {} raw events removed during cleaning ({:.2}%). \
         Sample fingerprint `{}`.\n",
        report.cleaning.removed_records(),
        report.cleaning.raw_events,
        report.cleaning.pct_removed(),
        report.sample_fingerprint
    ));

    let power = report.power.result();
    md.push_str("\n## Statistics\n\n");
    md.push_str("| Metric | Value |\n|---|---|\n");
    let rows = [
        (
            "SRM chi-square (p)",
            format!("{:.3} ({:.4})", report.srm.chi_square, report.srm.p_value),
        ),
        ("Absolute lift", pct_fine(test.absolute_lift)),
        ("Relative lift", relative(test)),
        ("Z statistic", format!("{:.4}", test.z_statistic)),
        ("p-value", format!("{:.4}", test.p_value)),
        (
            "Confidence interval",
            format!(
                "{:.0}% [{}, {}]",
                test.confidence_level() * 100.0,
                pct_fine(test.ci_low),
                pct_fine(test.ci_high)
            ),
        ),
        (
            "Cohen's h",
            format!("{:.4} ({})", test.effect_size_h, test.effect_magnitude),
        ),
        (
            "Achieved power",
            power.map_or_else(
                || "n/a".to_string(),
                |p| format!("{:.1}%", p.achieved_power * 100.0),
            ),
        ),
        (
            "Required n per group",
            power.map_or_else(|| "n/a".to_string(), |p| p.required_n_per_group.to_string()),
        ),
        (
            "P(treatment better)",
            format!("{:.2}%", report.bayesian.p_treatment_better * 100.0),
        ),
        (
            "Expected loss (ship / keep)",
            format!(
                "{} / {}",
                pct_fine(report.bayesian.expected_loss_treatment),
                pct_fine(report.bayesian.expected_loss_control)
            ),
        ),
    ];
    for (metric, value) in rows {
        md.push_str(&format!("| {} | {} |\n", metric, value));
    }

    let segments = &report.segments;
    if !segments.segments.is_empty() {
        md.push_str(&format!(
            "\n## Segments by {}\n\nBonferroni-corrected alpha: {:.4} over {} segment(s).\n\n",
            segments.key, segments.corrected_alpha, segments.n_segments
        ));
        md.push_str("| Segment | Users | Lift | p-value | Holm p | Significant |\n");
        md.push_str("|---|---:|---:|---:|---:|---|\n");
        for segment in &segments.segments {
            match &segment.status {
                SegmentStatus::Tested {
                    result,
                    holm_adjusted_p_value,
                } => md.push_str(&format!(
                    "| {} | {} | {} | {:.4} | {:.4} | {} |\n",
                    segment.label,
                    segment.n_users,
                    pct_fine(result.absolute_lift),
                    result.p_value,
                    holm_adjusted_p_value,
                    if result.reject_null { "yes" } else { "no" }
                )),
                SegmentStatus::Excluded { reason } => md.push_str(&format!(
                    "| {} | {} | | | | excluded: {} |\n",
                    segment.label, segment.n_users, reason
                )),
            }
        }
    }

    if !report.impact.is_empty() {
        md.push_str("\n## Business impact\n\n");
        md.push_str("| Scenario | Monthly | Yearly |\n|---|---:|---:|\n");
        for estimate in &report.impact {
            md.push_str(&format!(
                "| {} | {:.2} | {:.2} |\n",
                estimate.scenario, estimate.monthly_revenue_impact, estimate.yearly_revenue_impact
            ));
        }
    }

    md
}

/// Pretty-printed metrics record
pub fn to_json(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
