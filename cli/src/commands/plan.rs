use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;

use mealsync_core::models::{
    AssignmentEvent, DayOfWeek, MealAssignment, MealPlan, PlanContext, SyncReport,
};
use mealsync_core::service::PlannerService;

use super::helpers::{exit_not_found, parse_week, print_assignment_table, print_report};

fn print_json_report(report: &SyncReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn assignment_context(svc: &PlannerService, assignment_id: i64, json: bool) -> Result<PlanContext> {
    match svc.assignment_context(assignment_id)? {
        Some(ctx) => Ok(ctx),
        None => exit_not_found(&format!("Assignment {assignment_id} not found"), json),
    }
}

pub(crate) fn cmd_plan_add(
    svc: &PlannerService,
    household_id: &str,
    recipe_id: i64,
    day: DayOfWeek,
    week: Option<&str>,
    servings: Option<f64>,
    json: bool,
) -> Result<()> {
    let Some(recipe) = svc.find_recipe(recipe_id)? else {
        exit_not_found(&format!("Recipe {recipe_id} not found"), json);
    };
    let ctx = svc.plan_context(household_id, parse_week(week)?)?;
    let report = svc.apply_event(
        &ctx,
        AssignmentEvent::Add {
            recipe_id,
            day,
            serving_size: servings,
        },
    )?;

    if json {
        return print_json_report(&report);
    }
    let title = &recipe.title;
    match &report.assignment {
        Some(a) => println!("Planned {title} for {day} (assignment id: {})", a.id),
        None => println!("Planned {title} for {day}"),
    }
    print_report(&report);
    Ok(())
}

pub(crate) fn cmd_plan_remove(svc: &PlannerService, assignment_id: i64, json: bool) -> Result<()> {
    let ctx = assignment_context(svc, assignment_id, json)?;
    let report = svc.apply_event(&ctx, AssignmentEvent::Remove { assignment_id })?;
    if json {
        return print_json_report(&report);
    }
    println!("Removed assignment {assignment_id}");
    print_report(&report);
    Ok(())
}

pub(crate) fn cmd_plan_move(
    svc: &PlannerService,
    assignment_id: i64,
    day: DayOfWeek,
    json: bool,
) -> Result<()> {
    let ctx = assignment_context(svc, assignment_id, json)?;
    let report = svc.apply_event(&ctx, AssignmentEvent::Move { assignment_id, day })?;
    if json {
        return print_json_report(&report);
    }
    println!("Moved assignment {assignment_id} to {day}");
    Ok(())
}

pub(crate) fn cmd_plan_clear_day(
    svc: &PlannerService,
    household_id: &str,
    day: DayOfWeek,
    week: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = svc.plan_context(household_id, parse_week(week)?)?;
    let report = svc.apply_event(&ctx, AssignmentEvent::ClearDay { day })?;
    if json {
        return print_json_report(&report);
    }
    let removed = report.assignments_removed;
    println!("Cleared {day}: {removed} assignment(s) removed");
    print_report(&report);
    Ok(())
}

pub(crate) fn cmd_plan_clear_week(
    svc: &PlannerService,
    household_id: &str,
    week: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = svc.plan_context(household_id, parse_week(week)?)?;
    let report = svc.apply_event(&ctx, AssignmentEvent::ClearWeek)?;
    if json {
        return print_json_report(&report);
    }
    let removed = report.assignments_removed;
    println!("Cleared the week: {removed} assignment(s) removed");
    print_report(&report);
    Ok(())
}

pub(crate) fn cmd_plan_show(
    svc: &PlannerService,
    household_id: &str,
    week: Option<&str>,
    json: bool,
) -> Result<()> {
    #[derive(Serialize)]
    struct PlanView<'a> {
        plan: &'a MealPlan,
        assignments: &'a [MealAssignment],
    }

    let plan = svc.get_or_create_meal_plan(household_id, parse_week(week)?)?;
    let mut assignments = svc.list_assignments(plan.id)?;
    assignments.sort_by_key(|a| (a.day_of_week, a.id));

    if json {
        let view = PlanView {
            plan: &plan,
            assignments: &assignments,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let week_start = plan.week_start;
    println!("Week of {week_start} ({household_id})");
    if assignments.is_empty() {
        println!("Nothing planned yet. Add a meal with: mealsync plan add <recipe-id> <day>");
        return Ok(());
    }

    let mut titles: HashMap<i64, String> = HashMap::new();
    let mut rows = Vec::with_capacity(assignments.len());
    for a in assignments {
        if !titles.contains_key(&a.recipe_id) {
            let title = svc
                .find_recipe(a.recipe_id)?
                .map_or_else(|| format!("recipe {}", a.recipe_id), |r| r.title);
            titles.insert(a.recipe_id, title);
        }
        let title = titles.get(&a.recipe_id).cloned().unwrap_or_default();
        rows.push((a, title));
    }
    print_assignment_table(&rows);
    Ok(())
}
