//! Tree rendering of a report.

use super::Builder;
use crate::error::Result;
use owo_colors::OwoColorize;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

#[derive(Debug, Default)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(label: String) -> Self {
        Self {
            label,
            children: Vec::new(),
        }
    }

    fn push(&mut self, child: TreeNode) {
        self.children.push(child);
    }

    fn render(&self, out: &mut String) {
        out.push_str(&self.label);
        out.push('\n');
        self.render_children("", out);
    }

    fn render_children(&self, prefix: &str, out: &mut String) {
        let count = self.children.len();
        for (i, child) in self.children.iter().enumerate() {
            let last = i + 1 == count;
            let (branch, indent) = if last { (LAST_BRANCH, SPACE) } else { (BRANCH, PIPE) };
            let nested = format!("{}{}", prefix, indent);
            // continuation lines of multiline labels stay under their branch
            let mut lines = child.label.lines();
            out.push_str(prefix);
            out.push_str(branch);
            out.push_str(lines.next().unwrap_or_default());
            out.push('\n');
            for line in lines {
                out.push_str(&nested);
                out.push_str(line);
                out.push('\n');
            }
            child.render_children(&nested, out);
        }
    }
}

fn paint(color: bool, text: String, f: impl Fn(&str) -> String) -> String {
    if color {
        f(&text)
    } else {
        text
    }
}

impl Builder {
    fn use_colors(&self) -> bool {
        self.color && std::env::var_os("NO_COLOR").is_none()
    }

    /// Render the report as a tree followed by the summary lines.
    pub fn to_tree(&mut self) -> Result<String> {
        self.report.finalize();
        let color = self.use_colors();
        let report = &self.report;

        let mut root = TreeNode::new(".".to_string());
        for (file, groups) in report.nested() {
            let mut file_node = TreeNode::new(paint(color, format!("[file] {}", file), |s| {
                s.bold().to_string()
            }));
            for (group, rules) in groups {
                let mut group_node = TreeNode::new(paint(color, format!("[group] {}", group), |s| {
                    s.cyan().to_string()
                }));
                for (rule, (results, no_results)) in rules {
                    let total = results.len() + no_results.len();
                    let ok = no_results.is_empty();
                    let mut rule_node = TreeNode::new(paint(
                        color,
                        format!("[{}/{}] {}", results.len(), total, rule),
                        |s| {
                            if ok {
                                s.green().to_string()
                            } else {
                                s.yellow().to_string()
                            }
                        },
                    ));
                    for sel in results {
                        rule_node.push(TreeNode::new(paint(color, format!("[✔] {}", sel), |s| {
                            s.green().to_string()
                        })));
                    }
                    for sel in no_results {
                        rule_node.push(TreeNode::new(paint(color, format!("[✖] {}", sel), |s| {
                            s.red().to_string()
                        })));
                    }
                    group_node.push(rule_node);
                }
                file_node.push(group_node);
            }
            root.push(file_node);
        }

        let mut out = String::new();
        root.render(&mut out);
        out.push('\n');
        out.push_str(&format!(
            "Groups total: {}, Rules total: {}\n",
            report.total_groups, report.total_rules
        ));
        let summary = format!(
            "Selectors total: {}, Results found: {}, No Results found {} (No Results/Total: {:.2}%)",
            report.total_selectors_failed + report.total_selectors_success,
            report.total_selectors_success,
            report.total_selectors_failed,
            report.ratio_failed_total(),
        );
        out.push_str(&paint(color, summary, |s| s.bold().to_string()));
        out.push('\n');
        if report.total_rules_failed > 0 {
            out.push_str(&format!("Rules failed: {}\n", report.total_rules_failed));
        }
        if report.total_groups_failed > 0 {
            out.push_str(&format!("Groups failed: {}\n", report.total_groups_failed));
        }
        for failed in &report.failed_rules {
            let line = format!(
                "[✖] {}/{}/{}: {}",
                failed.file, failed.group, failed.name, failed.error
            );
            out.push_str(&paint(color, line, |s| s.red().to_string()));
            out.push('\n');
        }
        Ok(out)
    }
}
