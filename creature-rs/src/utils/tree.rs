//! Tree rendering for skeletons and asset contents

use console::Style;

/// A node in a rendered tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub node_type: NodeType,
    pub children: Vec<TreeNode>,
    pub metadata: Vec<(String, String)>,
}

/// Kinds of nodes in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Root,
    Header,
    Bone,
    Region,
    Clip,
}

/// Options for tree rendering
#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    pub max_depth: Option<usize>,
    pub no_color: bool,
    pub show_metadata: bool,
    pub compact: bool,
}

impl TreeNode {
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            children: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn add_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Metadata lines keep insertion order
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.push((key.to_string(), value.into()));
        self
    }
}

impl NodeType {
    pub fn icon(self) -> &'static str {
        match self {
            Self::Root => "📁",
            Self::Header => "📋",
            Self::Bone => "🦴",
            Self::Region => "🔷",
            Self::Clip => "📽️",
        }
    }

    pub fn style(self, no_color: bool) -> Style {
        if no_color {
            return Style::new();
        }
        match self {
            Self::Root => Style::new().bold().cyan(),
            Self::Header => Style::new().bold().yellow(),
            Self::Bone => Style::new().green(),
            Self::Region => Style::new().blue(),
            Self::Clip => Style::new().magenta(),
        }
    }
}

/// Render a tree to a string, one node per line
pub fn render_tree(root: &TreeNode, options: &TreeOptions) -> String {
    let mut output = String::new();
    render_node(root, &mut output, "", true, 0, options);
    output
}

fn render_node(
    node: &TreeNode,
    output: &mut String,
    prefix: &str,
    is_last: bool,
    depth: usize,
    options: &TreeOptions,
) {
    if let Some(max_depth) = options.max_depth
        && depth > max_depth
    {
        return;
    }

    let connector = match (depth, is_last) {
        (0, _) => "",
        (_, true) => "└── ",
        (_, false) => "├── ",
    };
    let style = node.node_type.style(options.no_color);
    output.push_str(&format!(
        "{prefix}{connector}{} {}",
        node.node_type.icon(),
        style.apply_to(&node.name)
    ));

    let show_metadata = options.show_metadata && !node.metadata.is_empty();
    if show_metadata && options.compact {
        let inline: Vec<String> = node
            .metadata
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect();
        output.push_str(&format!(" [{}]", inline.join(", ")));
    }
    output.push('\n');

    let child_prefix = match (depth, is_last) {
        (0, _) => String::new(),
        (_, true) => format!("{prefix}    "),
        (_, false) => format!("{prefix}│   "),
    };

    if show_metadata && !options.compact {
        let meta_style = if options.no_color {
            Style::new()
        } else {
            Style::new().dim()
        };
        for (key, value) in &node.metadata {
            output.push_str(&format!(
                "{child_prefix}    {}: {value}\n",
                meta_style.apply_to(key)
            ));
        }
    }

    for (i, child) in node.children.iter().enumerate() {
        let is_last_child = i + 1 == node.children.len();
        render_node(child, output, &child_prefix, is_last_child, depth + 1, options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeNode {
        TreeNode::new("hero.json", NodeType::Root).add_child(
            TreeNode::new("hip", NodeType::Bone)
                .with_metadata("id", "1")
                .add_child(TreeNode::new("knee", NodeType::Bone).with_metadata("id", "2"))
                .add_child(TreeNode::new("tail", NodeType::Bone)),
        )
    }

    #[test]
    fn test_render_connectors() {
        let options = TreeOptions {
            no_color: true,
            ..TreeOptions::default()
        };
        let rendered = render_tree(&sample(), &options);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("hero.json"));
        assert!(lines[1].starts_with("└── "));
        assert!(lines[2].starts_with("    ├── "));
        assert!(lines[3].starts_with("    └── "));
    }

    #[test]
    fn test_render_depth_and_metadata() {
        let options = TreeOptions {
            max_depth: Some(1),
            no_color: true,
            show_metadata: true,
            compact: true,
        };
        let rendered = render_tree(&sample(), &options);

        assert!(rendered.contains("hip [id:1]"));
        assert!(!rendered.contains("knee"));
    }

    #[test]
    fn test_render_metadata_lines() {
        let options = TreeOptions {
            no_color: true,
            show_metadata: true,
            ..TreeOptions::default()
        };
        let rendered = render_tree(&sample(), &options);
        assert!(rendered.contains("id: 2"));
    }
}
