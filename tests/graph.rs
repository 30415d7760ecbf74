use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use deimos as dm;
use dm::prelude::*;

mod framework;

use framework::{declare_scene, record, render_target, storage_buffer, storage_image, swapchain_image};

fn error_of<T: std::fmt::Debug>(result: Result<T>) -> Error {
    let err = result.expect_err("operation should fail");
    match err.downcast::<Error>() {
        Ok(err) => err,
        Err(err) => panic!("unexpected error type: {}", err),
    }
}

#[test]
fn scene_keeps_declaration_order() -> Result<()> {
    let mut graph = framework::make_graph();
    let scene = declare_scene(&mut graph, storage_image())?;
    graph.compile()?;

    assert_eq!(graph.state(), FrameState::Scheduled);
    assert_eq!(graph.order().unwrap(), vec!["geometry", "compute", "composite"]);
    let schedule = graph.schedule().unwrap();
    assert_eq!(schedule.lifetime(&scene.depth), Some(Lifetime::new(0, 0)));
    assert_eq!(schedule.lifetime(&scene.color), Some(Lifetime::new(0, 2)));
    assert_eq!(schedule.lifetime(&scene.bloom), Some(Lifetime::new(1, 2)));
    // Imported resources have no transient lifetime.
    assert_eq!(schedule.lifetime(&scene.swapchain), None);
    Ok(())
}

#[test]
fn dependency_edges() -> Result<()> {
    let mut graph = framework::make_graph();
    let scene = declare_scene(&mut graph, storage_image())?;
    let deps = graph.dependency_graph();

    assert_eq!(deps.num_passes(), 3);
    assert!(deps.depends_on(1, 0));
    assert!(deps.depends_on(2, 0));
    assert!(deps.depends_on(2, 1));
    assert!(!deps.depends_on(0, 1));
    let reasons = deps.dependencies(2).map(|(_, dependency)| dependency).collect::<Vec<_>>();
    assert!(reasons.contains(&Dependency::ReadAfterWrite(scene.bloom)));
    assert!(reasons.contains(&Dependency::ReadAfterWrite(scene.color)));
    Ok(())
}

#[test]
fn compile_is_idempotent() -> Result<()> {
    let mut graph = framework::make_graph();
    declare_scene(&mut graph, storage_image())?;
    graph.compile()?;
    let allocations = graph.allocator().provider().allocations;
    graph.compile()?;
    assert_eq!(graph.allocator().provider().allocations, allocations);
    assert_eq!(graph.order().unwrap().len(), 3);
    Ok(())
}

#[test]
fn unused_passes_are_culled() -> Result<()> {
    let mut graph = framework::make_graph();
    let scene = declare_scene(&mut graph, storage_image())?;
    let debug = graph.declare_resource("debug view", render_target(Format::Rgba8Unorm))?;
    graph.add_pass(
        PassBuilder::new("debug overlay")
            .sample_image(&scene.depth, PipelineStage::FRAGMENT_SHADER)
            .clear_color_attachment(&debug, ClearColor::Float([0.0; 4]))
            .build(),
    )?;
    graph.compile()?;

    let schedule = graph.schedule().unwrap();
    assert_eq!(schedule.culled(), &[3]);
    assert_eq!(schedule.position(3), None);
    assert_eq!(schedule.lifetime(&debug), None);
    // The culled reader does not extend the lifetime of the depth buffer.
    assert_eq!(schedule.lifetime(&scene.depth), Some(Lifetime::new(0, 0)));
    assert_eq!(graph.stats().passes_culled, 1);
    Ok(())
}

#[test]
fn explicit_ordering_does_not_keep_passes_alive() -> Result<()> {
    let mut graph = framework::make_graph();
    let unread = graph.declare_resource("unread", storage_buffer(1024))?;
    let output = graph.declare_resource("output", storage_buffer(1024))?;
    let dead = graph.add_pass(PassBuilder::new("dead").write(&unread, ResourceUsage::ShaderWrite).build())?;
    graph.add_pass(
        PassBuilder::new("live")
            .write(&output, ResourceUsage::ShaderWrite)
            .side_effect()
            .after(dead)
            .build(),
    )?;
    graph.compile()?;

    assert_eq!(graph.order().unwrap(), vec!["live"]);
    let schedule = graph.schedule().unwrap();
    assert_eq!(schedule.culled(), &[0]);
    assert_eq!(schedule.lifetime(&unread), None);
    assert_eq!(graph.memory_plan().placement(&unread), None);
    Ok(())
}

#[test]
fn culling_can_be_disabled() -> Result<()> {
    let settings = GraphSettingsBuilder::new().cull_passes(false).build()?;
    let mut graph = framework::make_graph_with(settings);
    let scratch = graph.declare_resource("scratch", storage_buffer(1024))?;
    graph.add_pass(PassBuilder::new("fill").write(&scratch, ResourceUsage::ShaderWrite).build())?;
    graph.compile()?;
    assert_eq!(graph.order().unwrap(), vec!["fill"]);
    Ok(())
}

#[test]
fn side_effect_passes_are_kept() -> Result<()> {
    let mut graph = framework::make_graph();
    let readback = graph.declare_resource("readback", storage_buffer(1024))?;
    graph.add_pass(
        PassBuilder::new("produce")
            .write(&readback, ResourceUsage::ShaderWrite)
            .build(),
    )?;
    graph.add_pass(
        PassBuilder::new("copy out")
            .read(&readback, ResourceUsage::ShaderRead)
            .side_effect()
            .build(),
    )?;
    graph.add_pass(PassBuilder::new("unused").write(&readback, ResourceUsage::ShaderWrite).build())?;
    graph.compile()?;
    assert_eq!(graph.order().unwrap(), vec!["produce", "copy out"]);
    Ok(())
}

#[test]
fn read_before_write_binds_forward() -> Result<()> {
    let mut graph = framework::make_graph();
    let lut = graph.declare_resource("lut", storage_image())?;
    let swapchain = graph.import_resource("swapchain", ExternalHandle(1), swapchain_image())?;
    graph.add_pass(
        PassBuilder::new("apply lut")
            .sample_image(&lut, PipelineStage::FRAGMENT_SHADER)
            .clear_color_attachment(&swapchain, ClearColor::Float([0.0; 4]))
            .build(),
    )?;
    graph.add_pass(
        PassBuilder::new("bake lut")
            .write_storage_image(&lut, PipelineStage::COMPUTE_SHADER)
            .build(),
    )?;
    graph.compile()?;
    assert_eq!(graph.order().unwrap(), vec!["bake lut", "apply lut"]);
    Ok(())
}

#[test]
fn explicit_ordering() -> Result<()> {
    let mut graph = framework::make_graph();
    let a = graph.declare_resource("a", storage_buffer(256))?;
    let b = graph.declare_resource("b", storage_buffer(256))?;
    let first = graph.add_pass(PassBuilder::new("first").write(&a, ResourceUsage::ShaderWrite).side_effect().build())?;
    graph.add_pass(
        PassBuilder::new("second")
            .write(&b, ResourceUsage::ShaderWrite)
            .side_effect()
            .after(first)
            .build(),
    )?;
    assert!(graph.dependency_graph().depends_on(1, 0));
    graph.compile()?;
    assert_eq!(graph.order().unwrap(), vec!["first", "second"]);
    Ok(())
}

#[test]
fn random_graphs_schedule_in_dependency_order() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0x5ced);
    for _ in 0..64 {
        let mut graph = framework::make_graph();
        let resources = (0..rng.gen_range(1..12))
            .map(|index| graph.declare_resource(format!("r{}", index), storage_buffer(256)))
            .collect::<Result<Vec<_>>>()?;
        let mut last_writer: Vec<Option<PassHandle>> = vec![None; resources.len()];
        let mut handles: Vec<PassHandle> = vec![];
        let mut accessed: Vec<Vec<VirtualResource>> = vec![];

        for index in 0..rng.gen_range(1..24) {
            let mut shuffled = (0..resources.len()).collect::<Vec<_>>();
            shuffled.shuffle(&mut rng);
            let reads = rng.gen_range(0..=shuffled.len().min(3));
            let writes = rng.gen_range(0..=(shuffled.len() - reads).min(2));

            let mut builder = PassBuilder::new(format!("p{}", index));
            let mut uses = vec![];
            // Only resources that already have a writer are read, so every dependency points backwards.
            for &r in shuffled[..reads].iter().filter(|&&r| last_writer[r].is_some()) {
                builder = builder.read(&resources[r], ResourceUsage::ShaderRead);
                uses.push(resources[r]);
            }
            for &r in &shuffled[reads..reads + writes] {
                builder = match last_writer[r] {
                    Some(previous) if rng.gen_bool(0.5) => builder
                        .write(&resources[r], ResourceUsage::ShaderWrite)
                        .after(previous),
                    Some(_) => builder.modify(&resources[r], ResourceUsage::ShaderWrite),
                    None => builder.write(&resources[r], ResourceUsage::ShaderWrite),
                };
                uses.push(resources[r]);
            }
            if !handles.is_empty() && rng.gen_bool(0.3) {
                builder = builder.after(handles[rng.gen_range(0..handles.len())]);
            }
            if rng.gen_bool(0.3) {
                builder = builder.side_effect();
            }

            let handle = graph.add_pass(builder.build())?;
            for &r in &shuffled[reads..reads + writes] {
                last_writer[r] = Some(handle);
            }
            handles.push(handle);
            accessed.push(uses);
        }
        graph.compile()?;

        let schedule = graph.schedule().unwrap();
        let deps = graph.dependency_graph();
        assert_eq!(schedule.len() + schedule.culled().len(), handles.len());
        for (pass, handle) in handles.iter().enumerate() {
            if graph.pass(*handle).unwrap().has_side_effect() {
                assert!(schedule.position(pass).is_some(), "side effect pass p{} was culled", pass);
            }
            let Some(position) = schedule.position(pass) else {
                continue;
            };
            for (producer, dependency) in deps.dependencies(pass) {
                match schedule.position(producer) {
                    Some(before) => assert!(before < position, "p{} runs before p{} ({})", pass, producer, dependency),
                    None => assert!(!dependency.carries_data(), "p{} reads from culled p{}", pass, producer),
                }
            }
        }

        for resource in &resources {
            let positions = schedule
                .order()
                .iter()
                .enumerate()
                .filter(|&(_, &pass)| accessed[pass].contains(resource))
                .map(|(position, _)| position)
                .collect::<Vec<_>>();
            let expected = positions
                .first()
                .zip(positions.last())
                .map(|(&first, &last)| Lifetime::new(first, last));
            assert_eq!(schedule.lifetime(resource), expected);
        }
    }
    Ok(())
}

#[test]
fn ready_passes_run_in_declaration_order() -> Result<()> {
    let mut graph = framework::make_graph();
    let names = ["a", "b", "c", "d"];
    for name in names {
        let buffer = graph.declare_resource(name, storage_buffer(256))?;
        graph.add_pass(
            PassBuilder::new(name)
                .write(&buffer, ResourceUsage::ShaderWrite)
                .side_effect()
                .build(),
        )?;
    }
    graph.compile()?;
    assert_eq!(graph.order().unwrap(), names.to_vec());
    Ok(())
}

#[test]
fn cycles_are_rejected() -> Result<()> {
    let mut graph = framework::make_graph();
    let t = graph.declare_resource("t", storage_buffer(256))?;
    let u = graph.declare_resource("u", storage_buffer(256))?;
    // `a` reads `t` before anyone writes it, so it binds to `b`, which in turn reads what `a` wrote.
    graph.add_pass(
        PassBuilder::new("a")
            .read(&t, ResourceUsage::ShaderRead)
            .write(&u, ResourceUsage::ShaderWrite)
            .side_effect()
            .build(),
    )?;
    graph.add_pass(
        PassBuilder::new("b")
            .read(&u, ResourceUsage::ShaderRead)
            .write(&t, ResourceUsage::ShaderWrite)
            .build(),
    )?;
    match error_of(graph.compile()) {
        Error::CyclicDependency(passes) => assert_eq!(passes, vec!["a", "b"]),
        err => panic!("unexpected error: {}", err),
    }
    // A failed compile discards the frame.
    assert_eq!(graph.state(), FrameState::Building);
    assert!(graph.schedule().is_none());
    assert_eq!(graph.allocator().provider().allocations, 0);
    Ok(())
}

#[test]
fn unordered_writes_are_ambiguous() -> Result<()> {
    let mut graph = framework::make_graph();
    let t = graph.declare_resource("target", storage_buffer(256))?;
    graph.add_pass(PassBuilder::new("first").write(&t, ResourceUsage::ShaderWrite).build())?;
    graph.add_pass(PassBuilder::new("second").write(&t, ResourceUsage::ShaderWrite).side_effect().build())?;
    match error_of(graph.compile()) {
        Error::AmbiguousWrite {
            resource,
            first,
            second,
        } => {
            assert_eq!(resource, "target");
            assert_eq!(first, "first");
            assert_eq!(second, "second");
        }
        err => panic!("unexpected error: {}", err),
    }
    Ok(())
}

#[test]
fn ordered_writes_are_accepted() -> Result<()> {
    let mut graph = framework::make_graph();
    let t = graph.declare_resource("target", storage_buffer(256))?;
    let first = graph.add_pass(PassBuilder::new("first").write(&t, ResourceUsage::ShaderWrite).build())?;
    graph.add_pass(
        PassBuilder::new("second")
            .write(&t, ResourceUsage::ShaderWrite)
            .after(first)
            .side_effect()
            .build(),
    )?;
    graph.add_pass(PassBuilder::new("third").modify(&t, ResourceUsage::ShaderWrite).side_effect().build())?;
    graph.compile()?;
    assert_eq!(graph.order().unwrap(), vec!["first", "second", "third"]);
    Ok(())
}

#[test]
fn readers_order_rewrites() -> Result<()> {
    let mut graph = framework::make_graph();
    let t = graph.declare_resource("target", storage_buffer(256))?;
    graph.add_pass(PassBuilder::new("write").write(&t, ResourceUsage::ShaderWrite).build())?;
    graph.add_pass(PassBuilder::new("read").read(&t, ResourceUsage::ShaderRead).side_effect().build())?;
    graph.add_pass(PassBuilder::new("rewrite").write(&t, ResourceUsage::ShaderWrite).side_effect().build())?;
    let deps = graph.dependency_graph();
    assert!(deps
        .dependencies(2)
        .any(|(from, dependency)| from == 1 && dependency == Dependency::WriteAfterRead(t)));
    graph.compile()?;
    assert_eq!(graph.order().unwrap(), vec!["write", "read", "rewrite"]);
    Ok(())
}

#[test]
fn declare_pass_infers_usage() -> Result<()> {
    let mut graph = framework::make_graph();
    let particles = graph.declare_resource("particles", storage_buffer(4096))?;
    let color = graph.declare_resource("color", render_target(Format::Rgba8Unorm))?;
    graph.declare_pass("init", &[], &[particles], false, record("init"))?;
    graph.declare_pass("simulate", &[particles], &[particles], false, record("simulate"))?;
    let draw = graph.declare_pass("draw", &[particles], &[color], true, record("draw"))?;

    let draw = graph.pass(draw).unwrap();
    assert_eq!(draw.inputs()[0].usage(), ResourceUsage::ShaderRead);
    assert_eq!(draw.outputs()[0].usage(), ResourceUsage::Attachment(AttachmentType::Color));

    graph.compile()?;
    assert_eq!(graph.order().unwrap(), vec!["init", "simulate", "draw"]);
    Ok(())
}

#[test]
fn modify_preserves_contents() -> Result<()> {
    let mut graph = framework::make_graph();
    let particles = graph.declare_resource("particles", storage_buffer(4096))?;
    graph.declare_pass("init", &[], &[particles], false, record("init"))?;
    let simulate = graph.declare_pass("simulate", &[particles], &[particles], true, record("simulate"))?;
    let simulate = graph.pass(simulate).unwrap();
    assert!(simulate.inputs().is_empty());
    assert_eq!(simulate.outputs()[0].load_op(), Some(LoadOp::Load));
    assert!(graph.dependency_graph().depends_on(1, 0));
    Ok(())
}

#[test]
fn unknown_resources_are_rejected() -> Result<()> {
    let mut graph = framework::make_graph();
    let stale = graph.declare_resource("stale", storage_buffer(256))?;
    graph.reset();
    let err = error_of(graph.add_pass(PassBuilder::new("use stale").read(&stale, ResourceUsage::ShaderRead).build()));
    assert!(matches!(err, Error::UnknownResource(resource) if resource == stale));
    Ok(())
}

#[test]
fn stale_pass_handles_are_rejected() -> Result<()> {
    let mut graph = framework::make_graph();
    let stale = graph.add_pass(PassBuilder::new("old").side_effect().build())?;
    graph.reset();
    assert!(graph.pass(stale).is_none());
    let err = error_of(graph.add_pass(PassBuilder::new("new").after(stale).build()));
    assert!(matches!(err, Error::UnknownPass(0)));
    Ok(())
}

#[test]
fn finalized_graph_rejects_declarations() -> Result<()> {
    let mut graph = framework::make_graph();
    declare_scene(&mut graph, storage_image())?;
    graph.compile()?;
    assert!(matches!(
        error_of(graph.declare_resource("late", storage_buffer(256))),
        Error::GraphFinalized
    ));
    assert!(matches!(
        error_of(graph.add_pass(PassBuilder::new("late").side_effect().build())),
        Error::GraphFinalized
    ));
    // Resetting discards the frame and allows new declarations.
    graph.reset();
    assert_eq!(graph.state(), FrameState::Building);
    graph.declare_resource("fresh", storage_buffer(256))?;
    Ok(())
}

#[test]
fn overlapping_access_is_rejected() -> Result<()> {
    let mut graph = framework::make_graph();
    let image = graph.declare_resource("image", storage_image())?;
    let err = error_of(
        graph.add_pass(
            PassBuilder::new("in place")
                .sample_image(&image, PipelineStage::COMPUTE_SHADER)
                .write_storage_image(&image, PipelineStage::COMPUTE_SHADER)
                .build(),
        ),
    );
    assert!(matches!(err, Error::OverlappingAccess { .. }));
    Ok(())
}

#[test]
fn incompatible_usage_is_rejected() -> Result<()> {
    let mut graph = framework::make_graph();
    let image = graph.declare_resource("storage", storage_image())?;
    let err = error_of(
        graph.add_pass(
            PassBuilder::new("draw")
                .clear_color_attachment(&image, ClearColor::Float([0.0; 4]))
                .build(),
        ),
    );
    match err {
        Error::IncompatibleUsage {
            pass,
            resource,
            usage,
        } => {
            assert_eq!(pass, "draw");
            assert_eq!(resource, "storage");
            assert_eq!(usage, ResourceUsage::Attachment(AttachmentType::Color));
        }
        err => panic!("unexpected error: {}", err),
    }
    Ok(())
}

#[test]
fn graphviz_output() -> Result<()> {
    let mut graph = framework::make_graph();
    declare_scene(&mut graph, storage_image())?;
    let dot = graph.dot()?;
    assert!(dot.contains("digraph"));
    assert!(dot.contains("0: geometry"));
    assert!(dot.contains("2: composite"));
    assert!(dot.contains("RAW image#1"));
    let svg = graph.svg()?;
    assert!(svg.contains("<svg"));
    Ok(())
}

#[test]
fn invalid_settings_are_rejected() -> Result<()> {
    assert!(matches!(
        error_of(GraphSettingsBuilder::new().block_size(0).build()),
        Error::InvalidSettings(_)
    ));
    assert!(matches!(
        error_of(GraphSettingsBuilder::new().max_idle_frames(0).build()),
        Error::InvalidSettings(_)
    ));
    assert!(matches!(
        error_of(GraphSettingsBuilder::new().block_size(1024).memory_budget(512).build()),
        Error::InvalidSettings(_)
    ));
    let settings = GraphSettingsBuilder::new()
        .memory_budget(1024 * 1024)
        .unlimited_memory()
        .build()?;
    assert_eq!(settings.memory_budget, None);
    Ok(())
}
