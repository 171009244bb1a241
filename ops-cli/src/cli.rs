use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Operator tooling for the blog authorization engine
#[derive(Parser, Debug)]
#[command(name = "blog-authz")]
#[command(about = "Inspect and operate the blog relationship-based authorization engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (YAML, TOML or JSON)
    #[arg(short, long, global = true, env = "BLOG_AUTHZ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate or print the relation schema
    #[command(subcommand)]
    Schema(SchemaCommand),

    /// Create the tuple table in the configured PostgreSQL store
    Migrate,

    /// Register a subject; the first one registered becomes admin
    Register {
        /// User id, with or without the `user:` prefix
        user: String,
    },

    /// Check whether a subject holds a relation on an object
    Check {
        /// Subject, e.g. `user:42` or `org:blog#admin`
        subject: String,
        relation: String,
        /// Object, e.g. `post:7`
        object: String,

        /// Print the resolution steps
        #[arg(long)]
        trace: bool,
    },

    /// Expand the subjects holding a relation on an object
    Expand {
        relation: String,
        object: String,

        /// Maximum expansion depth
        #[arg(long)]
        depth: Option<u32>,

        /// Print only the flattened subject list
        #[arg(long)]
        flat: bool,
    },

    /// Raw tuple access, bypassing the content policy
    #[command(subcommand)]
    Tuples(TupleCommand),

    /// Grant or revoke an org role
    #[command(subcommand)]
    Role(RoleCommand),

    /// Content-lifecycle operations
    #[command(subcommand)]
    Post(PostCommand),

    /// List registered users (admin only)
    Users(Actor),
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommand {
    /// Load and validate a schema document, reporting cycles
    Validate {
        /// Schema document; defaults to the configured schema
        path: Option<PathBuf>,
    },
    /// Print the effective schema
    Show {
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct TupleArgs {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

#[derive(Subcommand, Debug)]
pub enum TupleCommand {
    /// Read tuples matching a filter
    Read {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        relation: Option<String>,
        #[arg(long)]
        object_type: Option<String>,
        #[arg(long)]
        object: Option<String>,
    },
    /// Write a tuple (idempotent)
    Write(TupleArgs),
    /// Delete a tuple; absent tuples are ignored
    Delete(TupleArgs),
}

/// The acting user; anonymous when omitted
#[derive(Args, Debug, Clone)]
pub struct Actor {
    #[arg(long = "as", value_name = "USER")]
    pub actor: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum RoleCommand {
    Grant {
        user: String,
        /// admin, editor, moderator or viewer
        role: String,
        #[command(flatten)]
        actor: Actor,
    },
    Revoke {
        user: String,
        role: String,
        #[command(flatten)]
        actor: Actor,
    },
}

#[derive(Subcommand, Debug)]
pub enum PostCommand {
    Create {
        id: String,
        #[command(flatten)]
        actor: Actor,
    },
    Read {
        id: String,
        /// Owner recorded by the content store
        #[arg(long)]
        owner: String,
        /// draft or published
        #[arg(long, default_value = "draft")]
        status: String,
        #[command(flatten)]
        actor: Actor,
    },
    /// Filter a content-store export down to the records the actor may see
    List {
        /// JSON array of content records
        records: PathBuf,
        #[command(flatten)]
        actor: Actor,
    },
    Edit {
        id: String,
        #[command(flatten)]
        actor: Actor,
    },
    Delete {
        id: String,
        #[command(flatten)]
        actor: Actor,
    },
    Publish {
        id: String,
        #[command(flatten)]
        actor: Actor,
    },
    /// Hand ownership to another editor
    Transfer {
        id: String,
        new_owner: String,
        #[command(flatten)]
        actor: Actor,
    },
    /// Grant a moderator edit rights on one post
    GrantEdit {
        id: String,
        target: String,
        #[command(flatten)]
        actor: Actor,
    },
}
