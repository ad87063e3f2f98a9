mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_list_add, cmd_list_check, cmd_list_clear_checked, cmd_list_reconcile, cmd_list_remove,
    cmd_list_show, cmd_parse, cmd_plan_add, cmd_plan_clear_day, cmd_plan_clear_week,
    cmd_plan_move, cmd_plan_remove, cmd_plan_show, cmd_recipe_add, cmd_recipe_list,
    cmd_recipe_show, cmd_scale,
};
use crate::config::Config;
use mealsync_core::models::DayOfWeek;
use mealsync_core::service::PlannerService;

#[derive(Parser)]
#[command(
    name = "mealsync",
    version,
    about = "Plan the week's meals and keep the shopping list in sync"
)]
struct Cli {
    /// Log sync steps to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Assign recipes to days of the week
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// View and edit the week's shopping list
    List {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Show how an ingredient line is parsed and categorized
    Parse {
        /// Ingredient line (e.g. "1 1/2 cups flour")
        line: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scale a quantity string by a factor
    Scale {
        /// Quantity (e.g. "1/2", "1 1/2", "2.5")
        quantity: String,
        /// Factor to multiply by
        factor: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create a new recipe
    Add {
        /// Recipe title
        title: String,
        /// Number of servings the ingredient list makes
        #[arg(short, long)]
        servings: Option<f64>,
        /// Ingredient line, repeatable (e.g. -i "2 cups flour" -i "1 tsp salt")
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with its parsed ingredients
    Show {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Assign a recipe to a day and list its ingredients
    Add {
        /// Recipe ID
        recipe_id: i64,
        /// Day of the week (monday-sunday or mon-sun)
        day: DayOfWeek,
        /// Week (YYYY-MM-DD or this/last/next, default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Servings to cook (scales the ingredient quantities)
        #[arg(short, long)]
        servings: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an assignment by ID
    Remove {
        /// Assignment ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move an assignment to another day
    Move {
        /// Assignment ID
        id: i64,
        /// Target day of the week
        day: DayOfWeek,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every assignment on a day
    ClearDay {
        /// Day of the week
        day: DayOfWeek,
        /// Week (YYYY-MM-DD or this/last/next, default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every assignment in the week and empty its shopping list
    ClearWeek {
        /// Week (YYYY-MM-DD or this/last/next, default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the week's assignments
    Show {
        /// Week (YYYY-MM-DD or this/last/next, default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ListCommands {
    /// Show the week's shopping list
    Show {
        /// Week (YYYY-MM-DD or this/last/next, default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an item that does not come from a recipe
    Add {
        /// Item line (e.g. "2 l milk", "paper towels")
        line: String,
        /// Week (YYYY-MM-DD or this/last/next, default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check or uncheck an item
    Check {
        /// Item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an item
    Remove {
        /// Item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove all checked items
    ClearChecked {
        /// Week (YYYY-MM-DD or this/last/next, default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bring the list back in line with the week's assignments
    Reconcile {
        /// Week (YYYY-MM-DD or this/last/next, default: this week)
        #[arg(short, long)]
        week: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn open_service() -> Result<(PlannerService, String)> {
    let config = Config::load()?;
    let svc = PlannerService::new(config.db_path_str()?)?.with_sync_options(config.sync_options);
    Ok((svc, config.household_id))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Recipe { command } => {
            let (svc, _) = open_service()?;
            run_recipe(&svc, command)
        }
        Commands::Plan { command } => {
            let (svc, household) = open_service()?;
            run_plan(&svc, &household, command)
        }
        Commands::List { command } => {
            let (svc, household) = open_service()?;
            run_list(&svc, &household, command)
        }
        Commands::Parse { line, json } => cmd_parse(&line, json),
        Commands::Scale {
            quantity,
            factor,
            json,
        } => cmd_scale(&quantity, factor, json),
    }
}

fn run_recipe(svc: &PlannerService, command: RecipeCommands) -> Result<()> {
    match command {
        RecipeCommands::Add {
            title,
            servings,
            ingredients,
            json,
        } => cmd_recipe_add(svc, &title, servings, ingredients, json),
        RecipeCommands::List { json } => cmd_recipe_list(svc, json),
        RecipeCommands::Show { id, json } => cmd_recipe_show(svc, id, json),
    }
}

fn run_plan(svc: &PlannerService, household: &str, command: PlanCommands) -> Result<()> {
    match command {
        PlanCommands::Add {
            recipe_id,
            day,
            week,
            servings,
            json,
        } => cmd_plan_add(
            svc,
            household,
            recipe_id,
            day,
            week.as_deref(),
            servings,
            json,
        ),
        PlanCommands::Remove { id, json } => cmd_plan_remove(svc, id, json),
        PlanCommands::Move { id, day, json } => cmd_plan_move(svc, id, day, json),
        PlanCommands::ClearDay { day, week, json } => {
            cmd_plan_clear_day(svc, household, day, week.as_deref(), json)
        }
        PlanCommands::ClearWeek { week, json } => {
            cmd_plan_clear_week(svc, household, week.as_deref(), json)
        }
        PlanCommands::Show { week, json } => cmd_plan_show(svc, household, week.as_deref(), json),
    }
}

fn run_list(svc: &PlannerService, household: &str, command: ListCommands) -> Result<()> {
    match command {
        ListCommands::Show { week, json } => cmd_list_show(svc, household, week.as_deref(), json),
        ListCommands::Add { line, week, json } => {
            cmd_list_add(svc, household, &line, week.as_deref(), json)
        }
        ListCommands::Check { id, json } => cmd_list_check(svc, id, json),
        ListCommands::Remove { id, json } => cmd_list_remove(svc, id, json),
        ListCommands::ClearChecked { week, json } => {
            cmd_list_clear_checked(svc, household, week.as_deref(), json)
        }
        ListCommands::Reconcile { week, json } => {
            cmd_list_reconcile(svc, household, week.as_deref(), json)
        }
    }
}
