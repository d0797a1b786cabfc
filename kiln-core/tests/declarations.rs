mod common;

use std::fs;

use common::*;
use kiln_core::ast::{ModuleNode, Stmt, StmtKind};
use kiln_core::diagnostic::Diagnostics;
use kiln_core::parser::PreparsedModules;
use kiln_core::pipeline::stages::builtin;
use kiln_core::pipeline::{Pipeline, PipelineMode, PipelineValue, Stage, StageId, run_pipeline};
use kiln_core::{CompileOptions, CoreError};

fn vec_declarations() -> ModuleNode {
    ModuleNode::new(vec![
        func_decl("size", 2, false, 1),
        func_decl("puts", 1, true, 2),
        Stmt::new(
            StmtKind::VarDecl {
                name: "scratch".into(),
                ty: kiln(&["array"], 3),
            },
            at(3),
        ),
    ])
}

#[test]
fn declaration_unit_is_stored_in_the_context() {
    let trees = PreparsedModules::new().with("vec", vec_declarations());
    let mut ctx = context(CompileOptions::default(), trees);
    let mut diag = Diagnostics::new();
    let source = ctx.source("vec", None, "");
    let outcome = ctx.process_declaration(source, &mut diag).unwrap();

    assert!(outcome.is_ok(), "{:?}", outcome.error);
    let unit = outcome.output.into_declaration().expect("declaration unit");
    assert_eq!(unit.module_name, "vec");
    assert_eq!(unit.function("size").map(|f| f.arity), Some(2));
    assert!(unit.function("puts").unwrap().is_extern);
    assert_eq!(ctx.declarations().len(), 1);
}

#[test]
fn declaration_files_reject_bodies_and_statements() {
    let tree = ModuleNode::new(vec![
        func_def("size", 0, vec![], 4),
        assign("x", kiln(&["view", "contig"], 5), 5),
    ]);
    let mut ctx = context(
        CompileOptions::default(),
        PreparsedModules::new().with("bad", tree),
    );
    let mut diag = Diagnostics::new();
    let source = ctx.source("bad", None, "");
    let outcome = ctx.process_declaration(source, &mut diag).unwrap();

    let err = outcome.error.expect("rejected");
    assert_eq!(
        err.message,
        "function definition 'size' not allowed in a declaration file"
    );
    assert_eq!(err.span, Some(at(4)));
    assert_eq!(diag.error_count(), 2);
    assert!(ctx.declarations().is_empty());
}

#[test]
fn legacy_mode_aligns_definitions_with_declarations() {
    let trees = PreparsedModules::new().with("vec", vec_declarations());
    let mut loader = context(CompileOptions::default(), trees);
    let mut diag = Diagnostics::new();
    let source = loader.source("vec", None, "");
    loader.process_declaration(source, &mut diag).unwrap();

    // the implementation of `vec` defines size with the wrong arity
    let mut ctx = {
        let declarations = loader.declarations().to_vec();
        let mut ctx = context(
            CompileOptions::default(),
            PreparsedModules::new().with(
                "vec",
                ModuleNode::new(vec![func_def("size", 1, vec![], 10)]),
            ),
        );
        for unit in declarations {
            ctx.add_declarations(unit);
        }
        ctx
    };

    let source = ctx.source("vec", None, "");
    let outcome = ctx.compile(PipelineMode::Legacy, source.clone(), &mut diag).unwrap();
    let err = outcome.error.expect("arity mismatch");
    assert_eq!(
        err.message,
        "function 'size' takes 1 argument(s) but is declared with 2"
    );
    assert_eq!(err.span, Some(at(10)));

    // the source dialect does not align
    let mut diag = Diagnostics::new();
    let outcome = ctx.compile(PipelineMode::Source, source, &mut diag).unwrap();
    assert!(outcome.is_ok(), "{:?}", outcome.error);
}

#[test]
fn injected_declarations_are_merged_once() {
    let trees = PreparsedModules::new()
        .with("vec", vec_declarations())
        .with("main", ModuleNode::new(vec![]));
    let mut ctx = context(CompileOptions::default(), trees);
    let mut diag = Diagnostics::new();
    for _ in 0..2 {
        let source = ctx.source("vec", None, "");
        ctx.process_declaration(source, &mut diag).unwrap();
    }
    assert_eq!(ctx.declarations().len(), 1);

    let pipeline = Pipeline::from_stages(
        PipelineMode::Source,
        vec![
            Stage::Run(builtin(StageId::Parse).unwrap()),
            Stage::Run(builtin(StageId::InjectDeclarations).unwrap()),
            Stage::Run(builtin(StageId::InjectDeclarations).unwrap()),
        ],
    );
    let source = ctx.source("main", None, "");
    let outcome =
        run_pipeline(&pipeline, &mut ctx, &mut diag, PipelineValue::Source(source)).unwrap();
    let unit = outcome.output.as_unit().unwrap();
    assert_eq!(unit.tree.imported.len(), 1);
    assert_eq!(unit.tree.imported[0].module, "vec");
    // the declarations reference kiln.array, so its template is now needed
    assert_eq!(unit.utility_refs().len(), 1);
    assert!(matches!(
        unit.tree.imported[0].body[0].kind,
        StmtKind::FuncDecl { .. }
    ));
}

#[test]
fn declaration_roots_are_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("pkg")).unwrap();
    fs::write(dir.path().join("pkg/vec.kd"), "cdef size(a, b)").unwrap();
    fs::write(dir.path().join("README"), "not a declaration").unwrap();

    let trees = PreparsedModules::new().with("pkg.vec", vec_declarations());
    let options = CompileOptions::default().with_declaration_root(dir.path());
    let mut ctx = context(options, trees);
    let mut diag = Diagnostics::new();

    assert_eq!(ctx.load_declarations(&mut diag).unwrap(), 1);
    assert_eq!(ctx.declarations()[0].module_name, "pkg.vec");
}

#[test]
fn missing_declaration_root_fails_loading() {
    let dir = tempfile::tempdir().unwrap();
    let options = CompileOptions::default().with_declaration_root(dir.path().join("absent"));
    let mut ctx = context(options, PreparsedModules::new());
    let mut diag = Diagnostics::new();
    let err = ctx.load_declarations(&mut diag).unwrap_err();
    assert!(matches!(err, CoreError::MissingDeclarationRoot(_)));
}
