//! Build validated stages from declarative schema documents
//!
//! The loader walks the schema, compiles every expression string through
//! the caller-supplied [`ExpressionCompiler`], allocates leaf ids via the
//! [`StageBuilder`], and runs construction-time validation.

use std::sync::Arc;

use crate::core::error::Result;
use crate::expr::{DimensionValue, ExpressionCompiler};
use crate::stage::schema::{ElementDef, StageDef, ValueDef};
use crate::stage::template::{StageBuilder, Template, TemplateElement, TemplateRef};
use crate::stage::Stage;

/// Parse a JSON stage document and build a validated stage
pub fn load_stage_str(json: &str, compiler: &dyn ExpressionCompiler) -> Result<Stage> {
    let def: StageDef = serde_json::from_str(json)?;
    load_stage(&def, compiler)
}

/// Build a validated stage from an already-parsed definition
pub fn load_stage(def: &StageDef, compiler: &dyn ExpressionCompiler) -> Result<Stage> {
    let mut builder = StageBuilder::new();

    for (name, bounds) in &def.spatial {
        builder.spatial_dimension(name.clone(), *bounds);
    }
    for (name, bounds) in &def.parametric {
        builder.parametric_dimension(name.clone(), *bounds);
    }

    for (name, elements) in &def.templates {
        let template = build_template(elements, compiler, &mut builder)?;
        builder.named_template(name.clone(), template);
    }
    for entity in &def.entities {
        let template = build_template(&entity.dimensions, compiler, &mut builder)?;
        builder.entity(entity.name.clone(), template);
    }

    builder.finish()
}

fn build_template(
    defs: &[ElementDef],
    compiler: &dyn ExpressionCompiler,
    builder: &mut StageBuilder,
) -> Result<Template> {
    Ok(Template::new(build_elements(defs, compiler, builder)?))
}

fn build_elements(
    defs: &[ElementDef],
    compiler: &dyn ExpressionCompiler,
    builder: &mut StageBuilder,
) -> Result<Vec<TemplateElement>> {
    defs.iter()
        .map(|def| build_element(def, compiler, builder))
        .collect()
}

fn build_element(
    def: &ElementDef,
    compiler: &dyn ExpressionCompiler,
    builder: &mut StageBuilder,
) -> Result<TemplateElement> {
    match def {
        ElementDef::Branch(branch) => Ok(TemplateElement::Branch {
            condition: compiler.compile(&branch.when)?,
            template: TemplateRef::Inline(Arc::new(build_template(
                &branch.then,
                compiler,
                builder,
            )?)),
        }),
        ElementDef::Guard(guard) => Ok(TemplateElement::Guard(compiler.compile(&guard.guard)?)),
        ElementDef::Leaf(leaf) => {
            let mut dimensions = Vec::with_capacity(leaf.dimensions.len());
            for (key, value) in &leaf.dimensions {
                let value = match value {
                    ValueDef::Literal(number) => DimensionValue::Literal(*number),
                    ValueDef::Expr(source) => DimensionValue::Expr(compiler.compile(source)?),
                };
                dimensions.push((key.clone(), value));
            }
            let attributes = leaf
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect::<Vec<_>>();
            let template = leaf.template.clone().map(TemplateRef::Named);
            Ok(builder.leaf(dimensions, attributes, template))
        }
        ElementDef::Group(inner) => Ok(TemplateElement::Group(build_elements(
            inner, compiler, builder,
        )?)),
    }
}
