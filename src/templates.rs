//! Template instantiation.
//!
//! Every type carrying a [`TemplateInstance`] (`Pair<string, i32>`) is materialised as a
//! concrete struct named after the instance (`Pair__string__i32`) and added to the file
//! that declares the template. Expanding one instance can reveal others (a template field
//! typed with another template applied to a parameter), so instances are processed from
//! a worklist until it runs dry. Each instance name is expanded once.
//!
//! Only struct, union and exception fields and service method signatures are scanned;
//! constants, enums and typedefs are left as written.
//!
//! A template whose arguments grow on every expansion (`G<T>` holding `G<list<T>>`)
//! never reaches a fixpoint, so argument nesting and the number of instances are capped.

use crate::ast::{Field, Struct, TemplateDef, TemplateInstance, Thrift, Type};
use crate::driver::FileMap;
use crate::error::{Error, Result};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Deepest type tree accepted as a template argument.
pub const MAX_ARGUMENT_DEPTH: usize = 32;
/// Most instances one `render` call will materialise.
pub const MAX_INSTANCES: usize = 4096;

/// Expand every template instance reachable from the files in `files`.
///
/// When several files declare a template with the same name, the one in the first file
/// by path order wins.
pub fn render(mut files: FileMap) -> Result<FileMap> {
    let mut worklist = Worklist::default();
    for thrift in files.values() {
        worklist.collect_file(thrift);
    }
    info!(instances = worklist.pending.len(); "Rendering templates");

    let mut rendered = 0usize;
    while let Some(instance) = worklist.pending.pop() {
        if rendered == MAX_INSTANCES {
            return Err(Error::TooManyTemplateInstances { limit: MAX_INSTANCES });
        }
        if instance.type_args.iter().any(|arg| depth(arg) > MAX_ARGUMENT_DEPTH) {
            return Err(Error::TemplateNestingTooDeep {
                instance: instance.type_name(),
                limit: MAX_ARGUMENT_DEPTH,
            });
        }
        let (path, template) = find_template(&files, &instance.template_name)
            .ok_or_else(|| Error::UndefinedTemplate(instance.template_name.clone()))?;
        let name = instance.type_name();
        let fields = substitute_fields(template, &instance)?;
        worklist.collect_fields(&fields);
        let concrete = Struct {
            pos: template.def.pos,
            comment: template.def.comment.clone(),
            name: name.clone(),
            fields,
            annotations: template.def.annotations.clone(),
        };
        let path = path.clone();
        debug!(instance = name.as_str(), file:? = path; "Rendered template instance");
        if let Some(thrift) = files.get_mut(&path) {
            thrift.structs.insert(name, concrete);
        }
        rendered += 1;
    }

    info!(rendered = rendered; "Templates rendered");
    Ok(files)
}

fn find_template<'a>(files: &'a FileMap, name: &str) -> Option<(&'a PathBuf, &'a TemplateDef)> {
    files
        .iter()
        .find_map(|(path, thrift)| thrift.templates.get(name).map(|template| (path, template)))
}

/// Instances waiting to be expanded, plus the names of every instance ever queued.
#[derive(Default)]
struct Worklist {
    pending: Vec<TemplateInstance>,
    seen: HashSet<String>,
}

impl Worklist {
    fn collect_file(&mut self, thrift: &Thrift) {
        let structs = thrift
            .structs
            .values()
            .chain(thrift.unions.values())
            .chain(thrift.exceptions.values());
        for s in structs {
            self.collect_fields(&s.fields);
        }
        for service in thrift.services.values() {
            for method in service.methods.values() {
                if let Some(ty) = &method.return_type {
                    self.collect_type(ty);
                }
                self.collect_fields(&method.arguments);
                self.collect_fields(&method.exceptions);
            }
        }
    }

    fn collect_fields(&mut self, fields: &[Field]) {
        for field in fields {
            self.collect_type(&field.ty);
        }
    }

    fn collect_type(&mut self, ty: &Type) {
        if let Some(instance) = &ty.template_instance {
            if self.seen.insert(instance.type_name()) {
                self.pending.push(instance.clone());
            }
            for arg in &instance.type_args {
                self.collect_type(arg);
            }
        }
        for child in [&ty.key_type, &ty.value_type].into_iter().flatten() {
            self.collect_type(child);
        }
    }
}

/// Height of a type tree, counting container elements and template arguments.
fn depth(ty: &Type) -> usize {
    let children = [&ty.key_type, &ty.value_type].into_iter().flatten().map(|child| depth(child));
    let args = ty
        .template_instance
        .iter()
        .flat_map(|instance| instance.type_args.iter().map(depth));
    1 + children.chain(args).max().unwrap_or(0)
}

fn substitute_fields(template: &TemplateDef, instance: &TemplateInstance) -> Result<Vec<Field>> {
    if template.type_params.len() != instance.type_args.len() {
        return Err(Error::TemplateArgumentCount {
            template: instance.template_name.clone(),
            expected: template.type_params.len(),
            actual: instance.type_args.len(),
        });
    }
    let bindings: HashMap<&str, &Type> = template
        .type_params
        .iter()
        .map(String::as_str)
        .zip(&instance.type_args)
        .collect();
    Ok(template
        .def
        .fields
        .iter()
        .map(|field| Field {
            ty: substitute(&field.ty, &bindings),
            ..field.clone()
        })
        .collect())
}

/// Replace type parameter names with their bound types, through containers and the
/// arguments of nested template instances.
fn substitute(ty: &Type, bindings: &HashMap<&str, &Type>) -> Type {
    if let Some(instance) = &ty.template_instance {
        let instance = TemplateInstance {
            template_name: instance.template_name.clone(),
            type_args: instance.type_args.iter().map(|arg| substitute(arg, bindings)).collect(),
        };
        return Type {
            name: instance.type_name(),
            template_instance: Some(instance),
            ..ty.clone()
        };
    }
    if ty.key_type.is_none() && ty.value_type.is_none() {
        if let Some(bound) = bindings.get(ty.name.as_str()) {
            return (*bound).clone();
        }
    }
    Type {
        key_type: ty.key_type.as_deref().map(|key| Box::new(substitute(key, bindings))),
        value_type: ty.value_type.as_deref().map(|value| Box::new(substitute(value, bindings))),
        ..ty.clone()
    }
}
