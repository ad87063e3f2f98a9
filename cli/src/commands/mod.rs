mod helpers;
mod inspect;
mod list;
mod plan;
mod recipe;

pub(crate) use inspect::{cmd_parse, cmd_scale};
pub(crate) use list::{
    cmd_list_add, cmd_list_check, cmd_list_clear_checked, cmd_list_reconcile, cmd_list_remove,
    cmd_list_show,
};
pub(crate) use plan::{
    cmd_plan_add, cmd_plan_clear_day, cmd_plan_clear_week, cmd_plan_move, cmd_plan_remove,
    cmd_plan_show,
};
pub(crate) use recipe::{cmd_recipe_add, cmd_recipe_list, cmd_recipe_show};
