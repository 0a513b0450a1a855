use anyhow::Context;
use litefiber_core::*;
use litefiber_platform::{LoopConfig, run_idle_loop};

fn counter(cx: &mut RenderContext<'_>, props: &Attributes) -> Element {
    let label = props.get_str("label").unwrap_or("Count").to_string();
    let (count, set_count) = cx.use_state(0i32);

    create_element(
        "section",
        Attributes::new(),
        [
            create_element("h1", Attributes::new(), [format!("{label}: {count}")]),
            create_element(
                "button",
                Attributes::new().with("id", "inc").on("click", {
                    let set_count = set_count.clone();
                    move || set_count.update(|c| c + 1)
                }),
                ["Increment"],
            ),
            create_element(
                "button",
                Attributes::new()
                    .with("id", "dec")
                    .on("click", move || set_count.update(|c| c - 1)),
                ["Decrement"],
            ),
        ],
    )
}

fn app(_: &mut RenderContext<'_>, _: &Attributes) -> Element {
    create_element(
        "main",
        Attributes::new().with("id", "app"),
        [Element::component(counter, Attributes::new().with("label", "Clicks"))],
    )
}

fn button_by_id(host: &HeadlessHost, root: NodeId, id: &str) -> Option<NodeId> {
    let section = host.find(root, "section")?;
    host.children(section)
        .iter()
        .copied()
        .find(|b| host.attribute(*b, "id").and_then(AttrValue::as_str) == Some(id))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut host = HeadlessHost::new();
    let root = host.create_container();
    let engine = Engine::new(host);
    engine
        .render(Element::component(app, Attributes::new()), root)
        .context("initial render")?;

    let script = ["inc", "inc", "inc", "dec"];
    let mut missing = None;
    let stats = run_idle_loop(&engine, &LoopConfig::default(), |engine, stats| {
        if stats.aborted > 0 {
            return false;
        }
        if stats.commits == 0 || !engine.is_idle() {
            return true;
        }
        println!("{}", engine.with_host(|h| h.to_markup(root)));
        let Some(id) = script.get(stats.commits - 1) else {
            return false;
        };
        match engine.with_host(|h| button_by_id(h, root, id)) {
            Some(button) => {
                log::info!("clicking #{id}");
                engine.with_host(|h| h.dispatch(button, "click"));
                true
            }
            None => {
                missing = Some(*id);
                false
            }
        }
    });

    if stats.aborted > 0 {
        anyhow::bail!("a render failed; see the log");
    }
    if let Some(id) = missing {
        anyhow::bail!("no button #{id} rendered");
    }
    let text = engine.with_host(|h| h.text_content(root));
    log::info!("{} commits, final text: {text:?}", stats.commits);
    Ok(())
}
