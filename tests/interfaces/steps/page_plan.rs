//! PagePlan step definitions.

use brokerlink::query::{PagePlan, PageWindow};
use cucumber::{gherkin::Step, given, then, when, World};

/// Test context for page planning scenarios.
#[derive(Debug, Default, World)]
#[world(init = Self::new)]
pub struct PagePlanWorld {
    total: u64,
    page_size: u64,
    windows: Vec<PageWindow>,
}

impl PagePlanWorld {
    fn new() -> Self {
        Self::default()
    }
}

#[given(expr = "a reported total of {int}")]
async fn given_total(world: &mut PagePlanWorld, total: u64) {
    world.total = total;
}

#[given(expr = "a page size of {int}")]
async fn given_page_size(world: &mut PagePlanWorld, page_size: u64) {
    world.page_size = page_size;
}

#[when("the follow-up pages are planned")]
async fn when_planned(world: &mut PagePlanWorld) {
    world.windows = PagePlan::for_total(world.total, world.page_size).collect();
}

#[then("no follow-up page is requested")]
async fn then_no_pages(world: &mut PagePlanWorld) {
    assert!(
        world.windows.is_empty(),
        "expected no windows, got {:?}",
        world.windows
    );
}

#[then("the follow-up windows are:")]
async fn then_windows(world: &mut PagePlanWorld, step: &Step) {
    let table = step.table.as_ref().expect("step needs a table");
    let expected: Vec<PageWindow> = table
        .rows
        .iter()
        .skip(1)
        .map(|row| {
            PageWindow::new(
                row[0].parse().expect("offset"),
                row[1].parse().expect("limit"),
            )
        })
        .collect();
    assert_eq!(world.windows, expected);
}

#[then("no window is empty")]
async fn then_no_empty_window(world: &mut PagePlanWorld) {
    assert!(world.windows.iter().all(|w| w.limit > 0));
}
