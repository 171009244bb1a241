use crate::{
    cli::{Command, OutputFormat, PostCommand, RoleCommand, SchemaCommand, TupleArgs, TupleCommand},
    context::{connect_postgres, load_schema, AppContext},
};
use anyhow::{bail, Context, Result};
use auth_rebac::{
    AuthzError, ObjectRef, RelationName, RelationTuple, Schema, SubjectRef,
    TupleFilter,
};
use blog_policy::{
    ContentRecord, ContentStatus, Operation, OrgRole, Outcome, Principal, RoleAction, UserId,
};
use config_engine::AuthzSettings;
use serde::Serialize;
use tracing::info;

/// Run a command. Commands that need no store run before one is connected.
pub async fn execute(command: Command, settings: AuthzSettings) -> Result<()> {
    match command {
        Command::Schema(schema) => schema_command(schema, &settings),
        Command::Migrate => migrate(&settings).await,
        other => {
            let ctx = AppContext::build(settings).await?;
            store_command(other, &ctx).await
        }
    }
}

fn schema_command(command: SchemaCommand, settings: &AuthzSettings) -> Result<()> {
    match command {
        SchemaCommand::Validate { path } => {
            let schema = match path {
                Some(path) => Schema::load(&path)?,
                None => load_schema(settings)?,
            };
            let cycles = schema.cycles();
            println!("schema valid: {} types", schema.types.len());
            if !cycles.is_empty() {
                println!("cyclic relations (checks through them resolve to deny): {}", cycles.join(", "));
            }
            Ok(())
        }
        SchemaCommand::Show { format } => {
            let schema = load_schema(settings)?;
            match format {
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&schema)?),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&schema)?),
            }
            Ok(())
        }
    }
}

async fn migrate(settings: &AuthzSettings) -> Result<()> {
    let repository = connect_postgres(settings).await?;
    repository.ensure_schema().await?;
    println!("tuple store ready");
    Ok(())
}

async fn store_command(command: Command, ctx: &AppContext) -> Result<()> {
    match command {
        Command::Schema(_) | Command::Migrate => bail!("command does not use the tuple store"),
        Command::Register { user } => {
            let registration = ctx.policy.register_subject(&user.parse()?).await?;
            print_json(&registration)
        }
        Command::Check {
            subject,
            relation,
            object,
            trace,
        } => {
            let subject: SubjectRef = subject.parse()?;
            let relation: RelationName = relation.parse()?;
            let object: ObjectRef = object.parse()?;

            let decision = if trace {
                let (decision, steps) = ctx.engine.explain(&subject, &relation, &object).await?;
                for step in steps {
                    println!("{}", step);
                }
                decision
            } else {
                ctx.engine.check(&subject, &relation, &object).await?
            };

            println!("{}", decision);
            if decision.is_allowed() {
                Ok(())
            } else {
                Err(blog_policy::PolicyError::Denied { operation: "check" }.into())
            }
        }
        Command::Expand {
            relation,
            object,
            depth,
            flat,
        } => {
            let relation: RelationName = relation.parse()?;
            let object: ObjectRef = object.parse()?;
            if flat {
                let subjects = ctx.engine.list_subjects(&relation, &object).await?;
                for subject in subjects {
                    println!("{}", subject);
                }
                Ok(())
            } else {
                print_json(&ctx.engine.expand(&relation, &object, depth).await?)
            }
        }
        Command::Tuples(tuples) => tuple_command(tuples, ctx).await,
        Command::Role(role) => {
            let (action, user, role, actor) = match role {
                RoleCommand::Grant { user, role, actor } => (RoleAction::Grant, user, role, actor),
                RoleCommand::Revoke { user, role, actor } => (RoleAction::Revoke, user, role, actor),
            };
            let operation = Operation::ManageRole {
                action,
                role: role.parse::<OrgRole>()?,
                target: user.parse()?,
            };
            apply(ctx, actor.actor, operation).await
        }
        Command::Post(post) => post_command(post, ctx).await,
        Command::Users(actor) => {
            let users = ctx.policy.list_users(&principal(actor.actor)?).await?;
            for user in users {
                println!("{}", user);
            }
            Ok(())
        }
    }
}

async fn tuple_command(command: TupleCommand, ctx: &AppContext) -> Result<()> {
    match command {
        TupleCommand::Read {
            subject,
            relation,
            object_type,
            object,
        } => {
            let mut filter = TupleFilter::new();
            if let Some(subject) = subject {
                filter = filter.subject(subject.parse::<SubjectRef>()?);
            }
            if let Some(relation) = relation {
                filter = filter.relation(relation.parse()?);
            }
            if let Some(object_type) = object_type {
                filter = filter.object_type(&object_type);
            }
            if let Some(object) = object {
                filter = filter.object(object.parse()?);
            }

            for tuple in ctx.engine.read(&filter).await? {
                println!("{}", tuple);
            }
            Ok(())
        }
        TupleCommand::Write(args) => {
            let tuple = parse_tuple(&args)?;
            ctx.engine.write_tuples(vec![tuple.clone()]).await?;
            info!("Wrote {}", tuple);
            println!("+ {}", tuple);
            Ok(())
        }
        TupleCommand::Delete(args) => {
            let tuple = parse_tuple(&args)?;
            ctx.engine.delete_tuples(vec![tuple.clone()]).await?;
            info!("Deleted {}", tuple);
            println!("- {}", tuple);
            Ok(())
        }
    }
}

async fn post_command(command: PostCommand, ctx: &AppContext) -> Result<()> {
    let (actor, operation) = match command {
        PostCommand::List { records, actor } => {
            let raw = std::fs::read_to_string(&records)
                .with_context(|| format!("reading content records from {}", records.display()))?;
            let records: Vec<ContentRecord> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing content records from {}", records.display()))?;
            let visible = ctx
                .policy
                .visible_content(&principal(actor.actor)?, &records)
                .await?;
            return print_json(&visible);
        }
        PostCommand::Create { id, actor } => (actor, Operation::CreateContent { post_id: id }),
        PostCommand::Read {
            id,
            owner,
            status,
            actor,
        } => {
            let record = ContentRecord::new(&id, owner.parse()?, status.parse::<ContentStatus>()?)?;
            (actor, Operation::ReadContent { record })
        }
        PostCommand::Edit { id, actor } => (actor, Operation::EditContent { post_id: id }),
        PostCommand::Delete { id, actor } => (actor, Operation::DeleteContent { post_id: id }),
        PostCommand::Publish { id, actor } => (actor, Operation::PublishContent { post_id: id }),
        PostCommand::Transfer {
            id,
            new_owner,
            actor,
        } => (
            actor,
            Operation::TransferOwnership {
                post_id: id,
                new_owner: new_owner.parse()?,
            },
        ),
        PostCommand::GrantEdit { id, target, actor } => (
            actor,
            Operation::GrantEdit {
                post_id: id,
                target: target.parse()?,
            },
        ),
    };
    apply(ctx, actor.actor, operation).await
}

async fn apply(ctx: &AppContext, actor: Option<String>, operation: Operation) -> Result<()> {
    let outcome: Outcome = ctx.policy.apply(&principal(actor)?, operation).await?;
    print_json(&outcome)
}

fn principal(actor: Option<String>) -> Result<Principal> {
    Ok(match actor {
        Some(user) => Principal::Authenticated(user.parse::<UserId>()?),
        None => Principal::Anonymous,
    })
}

fn parse_tuple(args: &TupleArgs) -> Result<RelationTuple, AuthzError> {
    RelationTuple::parse(&args.subject, &args.relation, &args.object)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
