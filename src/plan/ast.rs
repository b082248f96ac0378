use serde_json::Value;
use std::collections::BTreeMap;

/// Parser output of `.ralph/plan.tsx` (spec §3). Prop values are literal
/// strings/numbers/booleans only; anything else (expressions, spreads)
/// collapses to `None` during parsing rather than appearing here.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub component: String,
    pub props: BTreeMap<String, PropValue>,
    pub children: Vec<PlanNode>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PlanNode {
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(PropValue::as_str)
    }

    pub fn children_named<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a PlanNode> {
        self.children.iter().filter(move |c| c.component == component)
    }

    pub fn find_first<'a>(&'a self, component: &str) -> Option<&'a PlanNode> {
        if self.component == component {
            return Some(self);
        }
        for child in &self.children {
            if let Some(found) = child.find_first(component) {
                return Some(found);
            }
        }
        None
    }

    /// Depth-first pre-order walk over every node, including self.
    pub fn walk<'a>(&'a self) -> Box<dyn Iterator<Item = &'a PlanNode> + 'a> {
        let children = self.children.iter().flat_map(|c| c.walk());
        Box::new(std::iter::once(self).chain(children))
    }
}

impl From<&PropValue> for Value {
    fn from(value: &PropValue) -> Self {
        match value {
            PropValue::Str(s) => Value::String(s.clone()),
            PropValue::Num(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            PropValue::Bool(b) => Value::Bool(*b),
        }
    }
}
