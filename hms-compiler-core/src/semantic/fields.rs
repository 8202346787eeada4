// Builtin member oracle for Homescript types
//
// Member expressions and object-literal collision checks consult this
// table: for a given type kind it yields the members (methods and plain
// fields) available on values of that type. All types offer `to_string`.

use indexmap::IndexMap;

use crate::source::Span;

use super::types::{FunctionParam, FunctionType, ObjectType, Params, Type, TypeKind};

fn method(params: Vec<(&str, Type)>, return_type: TypeKind) -> Type {
    let params = params
        .into_iter()
        .map(|(name, ty)| FunctionParam::new(name, ty))
        .collect();
    FunctionType::new(
        Params::Normal(params),
        Span::synthetic(),
        Type::synthetic(return_type),
    )
    .into_type(Span::synthetic())
}

fn ty(kind: TypeKind) -> Type {
    Type::synthetic(kind)
}

/// Members shared by object values regardless of their declared fields.
/// Object literal keys may not collide with these.
pub fn object_builtin_members() -> [&'static str; 2] {
    ["to_string", "keys"]
}

/// The members available on a value of the given type.
///
/// `any` is not handled here: member access on `any` yields `any` for
/// every name and is special-cased by the walker.
pub fn fields_of(base: &Type) -> IndexMap<String, Type> {
    let mut fields: IndexMap<String, Type> = IndexMap::new();
    fields.insert("to_string".to_string(), method(vec![], TypeKind::String));

    match &base.kind {
        TypeKind::Int => {
            fields.insert("to_range".to_string(), method(vec![], TypeKind::Range));
        }
        TypeKind::Float => {
            fields.insert("is_int".to_string(), method(vec![], TypeKind::Bool));
            fields.insert("trunc".to_string(), method(vec![], TypeKind::Int));
            fields.insert("round".to_string(), method(vec![], TypeKind::Int));
        }
        TypeKind::String => {
            fields.insert("len".to_string(), method(vec![], TypeKind::Int));
            fields.insert(
                "contains".to_string(),
                method(vec![("substring", ty(TypeKind::String))], TypeKind::Bool),
            );
            fields.insert("to_lower".to_string(), method(vec![], TypeKind::String));
            fields.insert("to_upper".to_string(), method(vec![], TypeKind::String));
            fields.insert(
                "replace".to_string(),
                method(
                    vec![("from", ty(TypeKind::String)), ("to", ty(TypeKind::String))],
                    TypeKind::String,
                ),
            );
            fields.insert(
                "split".to_string(),
                method(
                    vec![("separator", ty(TypeKind::String))],
                    TypeKind::List(Box::new(ty(TypeKind::String))),
                ),
            );
            fields.insert(
                "parse_int".to_string(),
                method(vec![], TypeKind::Option(Box::new(ty(TypeKind::Int)))),
            );
        }
        TypeKind::Range => {
            fields.insert("start".to_string(), ty(TypeKind::Int));
            fields.insert("end".to_string(), ty(TypeKind::Int));
            fields.insert("diff".to_string(), method(vec![], TypeKind::Int));
        }
        TypeKind::List(inner) => {
            let element: Type = (**inner).clone();
            fields.insert("len".to_string(), method(vec![], TypeKind::Int));
            fields.insert(
                "push".to_string(),
                method(vec![("element", element.clone())], TypeKind::Null),
            );
            fields.insert(
                "pop".to_string(),
                method(vec![], TypeKind::Option(Box::new(element.clone()))),
            );
            fields.insert(
                "contains".to_string(),
                method(vec![("element", element.clone())], TypeKind::Bool),
            );
            fields.insert(
                "concat".to_string(),
                method(
                    vec![("other", ty(TypeKind::List(Box::new(element.clone()))))],
                    TypeKind::List(Box::new(element)),
                ),
            );
        }
        TypeKind::Option(inner) => {
            let inner: Type = (**inner).clone();
            fields.insert("is_some".to_string(), method(vec![], TypeKind::Bool));
            fields.insert("is_none".to_string(), method(vec![], TypeKind::Bool));
            fields.insert(
                "unwrap".to_string(),
                method(vec![], inner.kind.clone()),
            );
            fields.insert(
                "unwrap_or".to_string(),
                method(vec![("fallback", inner.clone())], inner.kind),
            );
        }
        TypeKind::Object(ObjectType { fields: declared }) => {
            fields.insert(
                "keys".to_string(),
                method(vec![], TypeKind::List(Box::new(ty(TypeKind::String)))),
            );
            for field in declared {
                fields.insert(field.name.clone(), field.ty.clone());
            }
        }
        TypeKind::AnyObject => {
            fields.insert(
                "keys".to_string(),
                method(vec![], TypeKind::List(Box::new(ty(TypeKind::String)))),
            );
        }
        _ => {}
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::types::ObjectTypeField;

    #[test]
    fn test_every_type_has_to_string() {
        for kind in [
            TypeKind::Int,
            TypeKind::Null,
            TypeKind::Bool,
            TypeKind::Range,
            TypeKind::AnyObject,
        ] {
            assert!(fields_of(&ty(kind)).contains_key("to_string"));
        }
    }

    #[test]
    fn test_list_members_use_element_type() {
        let list = ty(TypeKind::List(Box::new(ty(TypeKind::Int))));
        let members = fields_of(&list);
        let pop = members.get("pop").unwrap();
        let TypeKind::Function(func) = &pop.kind else {
            panic!("expected function");
        };
        assert!(matches!(
            &func.return_type.kind,
            TypeKind::Option(inner) if matches!(inner.kind, TypeKind::Int)
        ));
    }

    #[test]
    fn test_object_declared_fields_visible() {
        let object = ty(TypeKind::Object(ObjectType {
            fields: vec![ObjectTypeField {
                name: "power".to_string(),
                ty: ty(TypeKind::Bool),
                span: Span::synthetic(),
                annotation: None,
            }],
        }));
        let members = fields_of(&object);
        assert!(members.contains_key("power"));
        assert!(members.contains_key("keys"));
    }
}
