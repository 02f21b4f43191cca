//! Template renderer module.
//!
//! Renders parsed template nodes with the given context.

use super::parser::Node;
use super::{escape_html, Result, TemplateContext, TemplateError, Value};

/// Template renderer.
pub struct Renderer<'a> {
    context: &'a TemplateContext,
}

impl<'a> Renderer<'a> {
    pub fn new(context: &'a TemplateContext) -> Self {
        Self { context }
    }

    /// Render a list of nodes to a string.
    pub fn render(&self, nodes: &[Node]) -> Result<String> {
        let mut output = String::new();

        for node in nodes {
            self.render_node(node, &mut output)?;
        }

        Ok(output)
    }

    fn render_node(&self, node: &Node, out: &mut String) -> Result<()> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable { name, escape } => {
                // Missing variables render as nothing.
                if let Some(value) = self.context.get(name) {
                    let text = value.to_display_string();
                    if *escape {
                        out.push_str(&escape_html(&text));
                    } else {
                        out.push_str(&text);
                    }
                }
            }
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let branch = if self.truthy(condition) {
                    then_branch
                } else {
                    else_branch
                };
                out.push_str(&self.render(branch)?);
            }
            Node::Unless { condition, body } => {
                if !self.truthy(condition) {
                    out.push_str(&self.render(body)?);
                }
            }
            Node::Each {
                variable,
                item_name,
                body,
            } => self.render_each(variable, item_name.as_deref(), body, out)?,
        }
        Ok(())
    }

    fn truthy(&self, name: &str) -> bool {
        self.context.get(name).is_some_and(Value::is_truthy)
    }

    fn render_each(
        &self,
        variable: &str,
        item_name: Option<&str>,
        body: &[Node],
        out: &mut String,
    ) -> Result<()> {
        let list = match self.context.get(variable) {
            Some(Value::List(items)) => items,
            Some(Value::Null) | None => return Ok(()),
            Some(_) => {
                return Err(TemplateError::Render(format!("'{variable}' is not a list")));
            }
        };

        let item_var_name = item_name.unwrap_or("this");

        for (index, item) in list.iter().enumerate() {
            let mut child = self.context.child();
            child.set(item_var_name, item.clone());
            child.set("@index", Value::from(index));
            child.set("@first", Value::Bool(index == 0));
            child.set("@last", Value::Bool(index + 1 == list.len()));
            expose_fields(&mut child, item);

            out.push_str(&Renderer::new(&child).render(body)?);
        }

        Ok(())
    }
}

/// Object fields become top-level names inside a block.
fn expose_fields(context: &mut TemplateContext, value: &Value) {
    if let Value::Object(obj) = value {
        for (key, val) in obj {
            context.set(key.clone(), val.clone());
        }
    }
}
