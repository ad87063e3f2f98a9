use anyhow::Result;

use mealsync_core::service::PlannerService;

use super::helpers::{
    exit_not_found, format_amount, parse_week, print_item_table, print_report, sort_by_aisle,
};

pub(crate) fn cmd_list_show(
    svc: &PlannerService,
    household_id: &str,
    week: Option<&str>,
    json: bool,
) -> Result<()> {
    let plan = svc.get_or_create_meal_plan(household_id, parse_week(week)?)?;
    let mut items = svc.list_items(plan.id)?;
    sort_by_aisle(&mut items);

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let week_start = plan.week_start;
    if items.is_empty() {
        println!("Shopping list for the week of {week_start} is empty.");
        return Ok(());
    }
    let open = items.iter().filter(|i| !i.is_checked).count();
    println!("Shopping list for the week of {week_start} ({open} of {} left)", items.len());
    print_item_table(&items);
    Ok(())
}

pub(crate) fn cmd_list_add(
    svc: &PlannerService,
    household_id: &str,
    line: &str,
    week: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = svc.plan_context(household_id, parse_week(week)?)?;
    let item = svc.add_manual_item(&ctx, line)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let amount = format_amount(item.quantity.as_deref(), item.unit.as_deref());
        let label = if amount.is_empty() {
            item.ingredient.clone()
        } else {
            format!("{amount} {}", item.ingredient)
        };
        println!("Added {label} to {} (id: {})", item.category, item.id);
    }
    Ok(())
}

pub(crate) fn cmd_list_check(svc: &PlannerService, item_id: i64, json: bool) -> Result<()> {
    if svc.find_item(item_id)?.is_none() {
        exit_not_found(&format!("Shopping list item {item_id} not found"), json);
    }
    let item = svc.toggle_item(item_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let state = if item.is_checked { "Checked" } else { "Unchecked" };
        println!("{state} {}", item.ingredient);
    }
    Ok(())
}

pub(crate) fn cmd_list_remove(svc: &PlannerService, item_id: i64, json: bool) -> Result<()> {
    if svc.remove_item(item_id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": item_id }));
        } else {
            println!("Removed item {item_id}");
        }
    } else {
        exit_not_found(&format!("Shopping list item {item_id} not found"), json);
    }
    Ok(())
}

pub(crate) fn cmd_list_clear_checked(
    svc: &PlannerService,
    household_id: &str,
    week: Option<&str>,
    json: bool,
) -> Result<()> {
    let plan = svc.get_or_create_meal_plan(household_id, parse_week(week)?)?;
    let cleared = svc.clear_checked_items(plan.id)?;
    if json {
        println!("{}", serde_json::json!({ "cleared": cleared }));
    } else {
        println!("Cleared {cleared} checked item(s)");
    }
    Ok(())
}

pub(crate) fn cmd_list_reconcile(
    svc: &PlannerService,
    household_id: &str,
    week: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = svc.plan_context(household_id, parse_week(week)?)?;
    let report = svc.reconcile(&ctx)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if report.items_inserted == 0 && report.items_deleted == 0 && report.is_clean() {
        println!("Shopping list is in sync with the plan");
    }
    print_report(&report);
    Ok(())
}
