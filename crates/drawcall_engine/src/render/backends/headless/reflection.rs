//! Interface reflection over GLSL source text
//!
//! Enough of the declaration grammar to find what a linked program would
//! expose: vertex inputs, uniform blocks and plain uniforms (arrays expanded
//! to `name[i]`). Statement bodies are not parsed.

/// Names a program exposes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    /// Vertex inputs in declaration order; the index is the location
    pub attributes: Vec<String>,
    /// Uniform block names in declaration order; the index is the block index
    pub blocks: Vec<String>,
    /// Plain uniforms in declaration order; the index is the location
    pub uniforms: Vec<String>,
}

/// Compile both stages and merge their interfaces
pub fn reflect(vertex: &str, fragment: &str) -> Result<ProgramInterface, String> {
    check_stage("vertex", vertex)?;
    check_stage("fragment", fragment)?;

    let mut interface = ProgramInterface::default();
    scan_stage(vertex, true, &mut interface);
    scan_stage(fragment, false, &mut interface);
    Ok(interface)
}

fn check_stage(stage: &str, source: &str) -> Result<(), String> {
    if source.trim().is_empty() {
        return Err(format!("{} stage is empty", stage));
    }
    if let Some(line) = source.lines().find(|line| line.trim_start().starts_with("#error")) {
        return Err(format!("{} stage: {}", stage, line.trim()));
    }
    if !source.contains("void main") {
        return Err(format!("{} stage has no entry point", stage));
    }
    Ok(())
}

fn scan_stage(source: &str, is_vertex: bool, interface: &mut ProgramInterface) {
    let without_comments: String = source
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .map(|line| line.split("//").next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    for statement in without_comments.split(';') {
        let statement = strip_layout(statement.trim());
        let statement = statement.trim_start_matches('}').trim();
        let tokens: Vec<&str> = statement.split_whitespace().collect();
        let Some(first) = tokens.first() else { continue };

        match *first {
            "in" if is_vertex => {
                if let Some(name) = tokens.last() {
                    push_unique(&mut interface.attributes, name);
                }
            }
            "uniform" => {
                if let Some(brace) = statement.find('{') {
                    let name = statement["uniform".len()..brace].trim();
                    if !name.is_empty() {
                        push_unique(&mut interface.blocks, name);
                    }
                } else if let Some(declarator) = tokens.last() {
                    push_declarator(&mut interface.uniforms, declarator);
                }
            }
            _ => {}
        }
    }
}

fn strip_layout(statement: &str) -> &str {
    if statement.starts_with("layout") {
        if let Some(close) = statement.find(')') {
            return statement[close + 1..].trim_start();
        }
    }
    statement
}

fn push_declarator(names: &mut Vec<String>, declarator: &str) {
    match (declarator.find('['), declarator.find(']')) {
        (Some(open), Some(close)) if close > open => {
            let base = &declarator[..open];
            let count: usize = declarator[open + 1..close].trim().parse().unwrap_or(1);
            for index in 0..count {
                push_unique(names, &format!("{}[{}]", base, index));
            }
        }
        _ => push_unique(names, declarator),
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|existing| existing == name) {
        names.push(name.to_string());
    }
}
