use std::fmt::Write;

use super::AnalysisEmail;
use crate::analysis::{AnalysisIssue, Severity};

const HTML_ISSUE_LIMIT: usize = 10;
const TEXT_ISSUE_LIMIT: usize = 5;

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn score_color(score: u32) -> &'static str {
    match score {
        90.. => "#10b981",
        70.. => "#f59e0b",
        _ => "#ef4444",
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "#ef4444",
        Severity::Medium => "#f59e0b",
        Severity::Low => "#10b981",
    }
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "🔴",
        Severity::Medium => "🟡",
        Severity::Low => "🟢",
    }
}

fn verdict(score: u32) -> &'static str {
    match score {
        90.. => "Excellent compliance!",
        70.. => "Good compliance with some areas for improvement",
        _ => "Several brand guideline violations detected",
    }
}

fn type_label(issue: &AnalysisIssue) -> String {
    issue.issue_type.as_str().replacen('_', " ", 1).to_uppercase()
}

pub fn subject(data: &AnalysisEmail) -> String {
    format!(
        "Brand Analysis Complete: {} (Score: {}/100)",
        data.file_name, data.compliance_score
    )
}

const STYLES: &str = r#"body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; background-color: #f8fafc; }
.container { background: white; border-radius: 8px; padding: 32px; }
.header { text-align: center; margin-bottom: 32px; padding-bottom: 24px; border-bottom: 2px solid #e5e7eb; }
.logo { font-size: 24px; font-weight: bold; color: #1f2937; }
.score-section { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 24px; border-radius: 8px; text-align: center; margin-bottom: 24px; }
.file-info { background: #f8fafc; padding: 20px; border-radius: 8px; margin-bottom: 24px; }
.stat-card { text-align: center; padding: 16px; border-radius: 8px; border: 1px solid #e5e7eb; }
.high { color: #ef4444; } .medium { color: #f59e0b; } .low { color: #10b981; }
.issue-item { padding: 16px; border-left: 4px solid #e5e7eb; margin-bottom: 12px; background: #f9fafb; }
.issue-item.high { border-left-color: #ef4444; } .issue-item.medium { border-left-color: #f59e0b; } .issue-item.low { border-left-color: #10b981; }
.issue-context { background: #e5e7eb; padding: 8px 12px; border-radius: 4px; font-family: monospace; font-size: 12px; }
.issue-suggestion { background: #dbeafe; padding: 8px 12px; border-radius: 4px; font-size: 14px; color: #1e40af; }
.download-button { display: inline-block; background: #3b82f6; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; font-weight: 600; }
.footer { text-align: center; padding-top: 24px; border-top: 1px solid #e5e7eb; color: #6b7280; font-size: 14px; }"#;

fn html_issue(out: &mut String, issue: &AnalysisIssue) {
    let severity = issue.severity.as_str();
    let color = severity_color(issue.severity);
    let _ = write!(
        out,
        r#"<div class="issue-item {severity}">
<div class="issue-header"><span class="issue-severity" style="background: {color}20; color: {color};">{} {}</span> <span class="issue-type">{}</span></div>
<div class="issue-message">{}</div>
<div class="issue-rule">Rule: {}</div>
"#,
        severity_icon(issue.severity),
        severity.to_uppercase(),
        type_label(issue),
        escape_html(&issue.message),
        escape_html(&issue.rule_violated),
    );
    if let Some(context) = issue.location.as_ref().and_then(|l| l.context.as_deref()) {
        let _ = writeln!(out, r#"<div class="issue-context">"{}"</div>"#, escape_html(context));
    }
    if let Some(suggestion) = issue.suggestion.as_deref() {
        let _ = writeln!(out, r#"<div class="issue-suggestion">💡 {}</div>"#, escape_html(suggestion));
    }
    out.push_str("</div>\n");
}

pub fn render_html(data: &AnalysisEmail) -> String {
    let file_name = escape_html(&data.file_name);
    let mut issues = String::new();
    if data.issues.is_empty() {
        issues.push_str(
            "<h3 style=\"color: #10b981;\">✅ No Issues Found</h3>\n\
             <p>Congratulations! Your content fully complies with all brand guidelines.</p>\n",
        );
    } else {
        let _ = writeln!(issues, "<h3>🔍 Issues Found ({})</h3>", data.total_issues);
        for issue in data.issues.iter().take(HTML_ISSUE_LIMIT) {
            html_issue(&mut issues, issue);
        }
        if data.issues.len() > HTML_ISSUE_LIMIT {
            let _ = writeln!(
                issues,
                "<p style=\"text-align: center; color: #6b7280; font-style: italic;\">... and {} more issues. View full details in the application.</p>",
                data.issues.len() - HTML_ISSUE_LIMIT
            );
        }
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Brand Analysis Results</title>
<style>
{STYLES}
.score-circle {{ width: 80px; height: 80px; border-radius: 50%; background: white; color: {score_color}; font-size: 24px; font-weight: bold; margin: 0 auto 16px; line-height: 80px; }}
</style>
</head>
<body>
<div class="container">
<div class="header"><div class="logo">🛡️ Brand Guard</div><p>Your brand analysis is complete</p></div>
<div class="score-section">
<div class="score-circle">{score}</div>
<h2 style="margin: 0;">Compliance Score</h2>
<p style="margin: 8px 0 0 0; opacity: 0.9;">{verdict}</p>
</div>
<div class="file-info">
<h3>📄 File Details</h3>
<div><strong>File Name:</strong> {file_name}</div>
<div><strong>Analyzed:</strong> {date}</div>
<div><strong>Guidelines:</strong> {guidelines}</div>
</div>
<div class="summary-stats">
<div class="stat-card"><div class="stat-number high">{high}</div><div class="stat-label">High Priority</div></div>
<div class="stat-card"><div class="stat-number medium">{medium}</div><div class="stat-label">Medium Priority</div></div>
<div class="stat-card"><div class="stat-number low">{low}</div><div class="stat-label">Low Priority</div></div>
</div>
<div class="issues-section">
{issues}</div>
<div class="download-section">
<h3>📥 Download Original File</h3>
<p>Access your analyzed file anytime</p>
<a href="{download}" class="download-button">Download {file_name}</a>
</div>
<div class="footer">
<p>This analysis was performed using Brand Guard's AI-powered brand compliance system.</p>
<p>Questions? Contact your admin or visit the Brand Guard dashboard.</p>
</div>
</div>
</body>
</html>"#,
        score_color = score_color(data.compliance_score),
        score = data.compliance_score,
        verdict = verdict(data.compliance_score),
        date = escape_html(&data.analysis_date),
        guidelines = escape_html(&data.guideline_folder_name),
        high = data.high_severity_issues,
        medium = data.medium_severity_issues,
        low = data.low_severity_issues,
        download = escape_html(&data.download_url),
    )
}

pub fn render_text(data: &AnalysisEmail) -> String {
    let verdict_line = match data.compliance_score {
        90.. => format!("✅ {}", verdict(data.compliance_score)),
        70.. => format!("⚠️ {}", verdict(data.compliance_score)),
        _ => format!("❌ {}", verdict(data.compliance_score)),
    };

    let mut out = format!(
        "🛡️ BRAND GUARD - ANALYSIS COMPLETE\n\n\
         File: {}\nAnalyzed: {}\nGuidelines: {}\n\n\
         COMPLIANCE SCORE: {}/100\n{verdict_line}\n\n\
         ISSUES SUMMARY:\n\
         🔴 High Priority: {}\n🟡 Medium Priority: {}\n🟢 Low Priority: {}\n\
         Total Issues: {}\n\n",
        data.file_name,
        data.analysis_date,
        data.guideline_folder_name,
        data.compliance_score,
        data.high_severity_issues,
        data.medium_severity_issues,
        data.low_severity_issues,
        data.total_issues,
    );

    if data.issues.is_empty() {
        out.push_str(
            "✅ NO ISSUES FOUND\nCongratulations! Your content fully complies with all brand guidelines.\n",
        );
    } else {
        out.push_str("ISSUES FOUND:\n");
        for (index, issue) in data.issues.iter().take(TEXT_ISSUE_LIMIT).enumerate() {
            let _ = writeln!(
                out,
                "\n{}. {} {} - {}\n   {}\n   Rule: {}",
                index + 1,
                severity_icon(issue.severity),
                issue.severity.as_str().to_uppercase(),
                type_label(issue),
                issue.message,
                issue.rule_violated
            );
            if let Some(context) = issue.location.as_ref().and_then(|l| l.context.as_deref()) {
                let _ = writeln!(out, "   Context: \"{context}\"");
            }
            if let Some(suggestion) = issue.suggestion.as_deref() {
                let _ = writeln!(out, "   💡 {suggestion}");
            }
        }
        if data.issues.len() > TEXT_ISSUE_LIMIT {
            let _ = writeln!(
                out,
                "\n... and {} more issues. View full details in the Brand Guard dashboard.",
                data.issues.len() - TEXT_ISSUE_LIMIT
            );
        }
    }

    let _ = write!(
        out,
        "\nDOWNLOAD YOUR FILE:\n{}\n\n---\n\
         This analysis was performed using Brand Guard's AI-powered brand compliance system.\n\
         Questions? Contact your admin or visit the Brand Guard dashboard.",
        data.download_url
    );
    out
}

pub const TEST_SUBJECT: &str = "Brand Guard - Email Service Test";

pub const TEST_TEXT: &str =
    "This is a test email from Brand Guard. If you receive this, the email service is working correctly!";

pub const TEST_HTML: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">🛡️ Brand Guard - Email Test</h2>
<p>This is a test email from Brand Guard.</p>
<p>If you receive this message, the email service is configured correctly!</p>
<div style="background: #f0f9ff; padding: 16px; border-radius: 8px; margin: 16px 0;">
<p style="margin: 0;"><strong>✅ Email Service Status:</strong> Working correctly</p>
</div>
</div>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{IssueLocation, IssueType};

    fn issue(message: &str) -> AnalysisIssue {
        AnalysisIssue {
            issue_type: IssueType::BannedWord,
            severity: Severity::High,
            message: message.into(),
            location: Some(IssueLocation {
                context: Some("<b>very</b>".into()),
                ..Default::default()
            }),
            suggestion: Some("Drop it".into()),
            rule_violated: "Banned words".into(),
        }
    }

    fn email(issues: Vec<AnalysisIssue>, score: u32) -> AnalysisEmail {
        AnalysisEmail {
            file_name: "Q3 <launch>.docx".into(),
            file_id: "f1".into(),
            user_email: "a@b.com".into(),
            compliance_score: score,
            total_issues: issues.len(),
            high_severity_issues: issues.len(),
            medium_severity_issues: 0,
            low_severity_issues: 0,
            issues,
            guideline_folder_name: "Default Guidelines".into(),
            download_url: "https://files.test/x?a=1&b=2".into(),
            analysis_date: "2024-05-01".into(),
        }
    }

    #[test]
    fn score_colors() {
        assert_eq!(score_color(95), "#10b981");
        assert_eq!(score_color(90), "#10b981");
        assert_eq!(score_color(70), "#f59e0b");
        assert_eq!(score_color(69), "#ef4444");
    }

    #[test]
    fn html_escapes_user_strings_and_caps_issue_list() {
        let issues = (0..12).map(|i| issue(&format!("issue {i} & more"))).collect();
        let html = render_html(&email(issues, 0));
        assert!(html.contains("Q3 &lt;launch&gt;.docx"));
        assert!(html.contains("issue 0 &amp; more"));
        assert!(html.contains("&lt;b&gt;very&lt;/b&gt;"));
        assert!(!html.contains("issue 10 &amp; more"));
        assert!(html.contains("... and 2 more issues"));
        assert!(html.contains("BANNED WORD"));
        assert!(html.contains("href=\"https://files.test/x?a=1&amp;b=2\""));
    }

    #[test]
    fn text_lists_five_issues() {
        let issues = (0..7).map(|i| issue(&format!("issue {i}"))).collect();
        let text = render_text(&email(issues, 30));
        assert!(text.contains("COMPLIANCE SCORE: 30/100"));
        assert!(text.contains("5. 🔴 HIGH - BANNED WORD"));
        assert!(!text.contains("issue 5"));
        assert!(text.contains("... and 2 more issues"));
    }

    #[test]
    fn clean_report() {
        let data = email(Vec::new(), 100);
        assert!(render_text(&data).contains("NO ISSUES FOUND"));
        assert!(render_html(&data).contains("No Issues Found"));
        assert_eq!(subject(&data), "Brand Analysis Complete: Q3 <launch>.docx (Score: 100/100)");
    }
}
