//! Interpretation of resolver arguments.
//!
//! The GraphQL layer has already checked arguments against their declared types by the time a
//! resolver sees them, so these functions mostly translate: filter input becomes a store
//! [`Filter`], sort enum values become sort keys, and so on. What they still reject is input the
//! type system cannot rule out, like malformed ids or negative limits.

use super::type_composer::{
    DocumentBinding, COMPARISON_OPERATORS, LIST_OPERATORS, OPERATORS_FIELD,
};
use crate::schema::Fields;
use crate::store::{Condition, Direction, Error, FieldPath, Filter, ObjectId, Op, Query};
use async_graphql::{dynamic::ObjectAccessor, Value};

pub const ID: &str = "id";
pub const IDS: &str = "ids";
pub const FILTER: &str = "filter";
pub const SKIP: &str = "skip";
pub const LIMIT: &str = "limit";
pub const SORT: &str = "sort";
pub const RECORD: &str = "record";

/// The value of the argument `name`, unless it is absent or `null`.
pub fn get(args: &ObjectAccessor, name: &str) -> Option<Value> {
    match args.get(name)?.as_value() {
        Value::Null => None,
        value => Some(value.clone()),
    }
}

/// The `id` argument.
pub fn id(args: &ObjectAccessor) -> Result<ObjectId, Error> {
    parse_id(&get(args, ID).unwrap_or(Value::Null))
}

/// The `ids` argument.
pub fn ids(args: &ObjectAccessor) -> Result<Vec<ObjectId>, Error> {
    match get(args, IDS) {
        Some(Value::List(ids)) => ids.iter().map(parse_id).collect(),
        Some(id) => Ok(vec![parse_id(&id)?]),
        None => Ok(vec![]),
    }
}

/// The `record` argument.
pub fn record(args: &ObjectAccessor) -> Result<Fields, Error> {
    match get(args, RECORD) {
        Some(Value::Object(fields)) => Ok(fields),
        Some(value) => Err(Error::InvalidQuery {
            message: format!("record must be an object, got {value}"),
        }),
        None => Err(Error::InvalidQuery {
            message: "record is required".into(),
        }),
    }
}

/// The `filter` argument. An absent filter matches everything.
pub fn filter(args: &ObjectAccessor) -> Result<Filter, Error> {
    get(args, FILTER).map_or(Ok(Filter::all()), |filter| parse_filter(&filter))
}

/// The `filter`, `skip`, `limit` and `sort` arguments, whichever the resolver declares.
pub fn query(args: &ObjectAccessor, binding: &DocumentBinding) -> Result<Query, Error> {
    let mut query = Query::new(filter(args)?);
    if let Some(skip) = get(args, SKIP) {
        query = query.skip(parse_count(SKIP, &skip)?);
    }
    if let Some(limit) = get(args, LIMIT) {
        query = query.limit(parse_count(LIMIT, &limit)?);
    }
    if let Some(sort) = get(args, SORT) {
        let (path, direction) = parse_sort(binding, &sort)?;
        query = query.sort(path, direction);
    }
    Ok(query)
}

pub fn parse_id(value: &Value) -> Result<ObjectId, Error> {
    match value {
        Value::String(id) => id.parse(),
        value => Err(Error::InvalidId {
            id: value.to_string(),
        }),
    }
}

/// A non-negative number, named `name` in errors.
pub fn parse_count(name: &str, value: &Value) -> Result<usize, Error> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Error::InvalidQuery {
                message: format!("{name} must be a non-negative integer, got {n}"),
            }),
        value => Err(Error::InvalidQuery {
            message: format!("{name} must be a non-negative integer, got {value}"),
        }),
    }
}

pub fn parse_sort(
    binding: &DocumentBinding,
    value: &Value,
) -> Result<(FieldPath, Direction), Error> {
    let key = match value {
        Value::Enum(name) => binding.sort_key(name.as_str()),
        Value::String(name) => binding.sort_key(name),
        _ => None,
    };
    key.cloned().ok_or_else(|| Error::InvalidQuery {
        message: format!("cannot sort {} by {value}", binding.type_name),
    })
}

/// Translate filter input into a store filter.
///
/// Each field of the input is an equality condition on the field of the same name, and nested
/// input objects are conditions on fields of embedded documents. The `_operators` field holds
/// further conditions, grouped first by field, then by operator.
pub fn parse_filter(value: &Value) -> Result<Filter, Error> {
    let mut conditions = vec![];
    match value {
        Value::Object(fields) => equalities(&mut conditions, None, fields)?,
        Value::Null => {}
        value => {
            return Err(Error::InvalidQuery {
                message: format!("filter must be an object, got {value}"),
            })
        }
    }
    Ok(conditions.into_iter().collect())
}

fn equalities(
    conditions: &mut Vec<Condition>,
    prefix: Option<&FieldPath>,
    fields: &Fields,
) -> Result<(), Error> {
    for (name, value) in fields {
        if prefix.is_none() && name.as_str() == OPERATORS_FIELD {
            operators(conditions, value)?;
            continue;
        }
        let path = match prefix {
            Some(prefix) => prefix.child(name.as_str()),
            None => FieldPath::new([name.as_str()]),
        };
        match value {
            Value::Object(nested) => equalities(conditions, Some(&path), nested)?,
            value => conditions.push(Condition {
                path,
                op: Op::Eq(value.clone()),
            }),
        }
    }
    Ok(())
}

fn operators(conditions: &mut Vec<Condition>, value: &Value) -> Result<(), Error> {
    let fields = match value {
        Value::Object(fields) => fields,
        Value::Null => return Ok(()),
        value => {
            return Err(Error::InvalidQuery {
                message: format!("{OPERATORS_FIELD} must be an object, got {value}"),
            })
        }
    };
    for (field, ops) in fields {
        let ops = match ops {
            Value::Object(ops) => ops,
            Value::Null => continue,
            value => {
                return Err(Error::InvalidQuery {
                    message: format!("operators on {field} must be an object, got {value}"),
                })
            }
        };
        for (op, operand) in ops {
            if *operand == Value::Null {
                continue;
            }
            let op = match op.as_str() {
                "gt" => Op::Gt(operand.clone()),
                "gte" => Op::Gte(operand.clone()),
                "lt" => Op::Lt(operand.clone()),
                "lte" => Op::Lte(operand.clone()),
                "ne" => Op::Ne(operand.clone()),
                "in" => Op::In(operands(operand)),
                "nin" => Op::Nin(operands(operand)),
                op => {
                    return Err(Error::InvalidQuery {
                        message: format!(
                            "unknown operator {op}, expected one of {}",
                            COMPARISON_OPERATORS
                                .iter()
                                .chain(&LIST_OPERATORS)
                                .copied()
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                    })
                }
            };
            conditions.push(Condition {
                path: FieldPath::new([field.as_str()]),
                op,
            });
        }
    }
    Ok(())
}

/// The operands of a list operator. A single value is coerced to a list, as GraphQL does.
fn operands(value: &Value) -> Vec<Value> {
    match value {
        Value::List(values) => values.clone(),
        value => vec![value.clone()],
    }
}
