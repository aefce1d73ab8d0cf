use adana_syntax::ast::*;
use paste::paste;

use crate::error::Result;

/// What a walk should do after a node has been visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitFlow {
    Continue,
    /// Skip the children and the post-visit of this node.
    Skip,
}

/// Mutable tree visitor. `visit_*` is called before the children of a node are walked and
/// `post_visit_*` after, so rewrites done in `post_visit_*` are never visited themselves.
pub trait Visitor {
    fn visit_program(&mut self, _program: &mut Program) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }
    fn visit_statement_list(&mut self, _list: &mut Vec<Stmt>) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }
    fn visit_statement(&mut self, _statement: &mut Stmt) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }
    fn visit_block(&mut self, _block: &mut Block) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }
    fn visit_expression(&mut self, _expression: &mut Expr) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }
    fn visit_function(&mut self, _function: &mut Function) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }
    fn visit_switch_case(&mut self, _case: &mut SwitchCase) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }
    fn visit_catch_clause(&mut self, _clause: &mut CatchClause) -> Result<VisitFlow> {
        Ok(VisitFlow::Continue)
    }

    fn post_visit_program(&mut self, _program: &mut Program) -> Result<()> {
        Ok(())
    }
    fn post_visit_statement_list(&mut self, _list: &mut Vec<Stmt>) -> Result<()> {
        Ok(())
    }
    fn post_visit_statement(&mut self, _statement: &mut Stmt) -> Result<()> {
        Ok(())
    }
    fn post_visit_block(&mut self, _block: &mut Block) -> Result<()> {
        Ok(())
    }
    fn post_visit_expression(&mut self, _expression: &mut Expr) -> Result<()> {
        Ok(())
    }
    fn post_visit_function(&mut self, _function: &mut Function) -> Result<()> {
        Ok(())
    }
    fn post_visit_switch_case(&mut self, _case: &mut SwitchCase) -> Result<()> {
        Ok(())
    }
    fn post_visit_catch_clause(&mut self, _clause: &mut CatchClause) -> Result<()> {
        Ok(())
    }
}

pub trait Walk {
    fn walk(&mut self, visitor: &mut dyn Visitor) -> Result<()>;
}

macro_rules! impl_walk {
    // Implement `Walk` for a type, calling the given function.
    ($ty:ty, | $val:ident, $visitor:ident | $e:expr) => {
        impl Walk for $ty {
            fn walk(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
                let $val = self;
                let $visitor = visitor;
                $e
            }
        }
    };
    ($ty:ty, $func:ident, | $val:ident, $visitor:ident | $e:expr) => {
        impl_walk!($ty, |$val, $visitor| {
            if $visitor.$func($val)? == VisitFlow::Skip {
                return Ok(());
            }
            let r: Result<()> = $e;
            r?;
            paste! { $visitor.[<post_ $func>]($val) }
        });
    };
}

impl_walk!(Program, visit_program, |program, visitor| program.body.walk(visitor));

impl_walk!(Vec<Stmt>, visit_statement_list, |list, visitor| {
    for statement in list.iter_mut() {
        statement.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(Block, visit_block, |block, visitor| block.body.walk(visitor));

impl_walk!(Stmt, visit_statement, |statement, visitor| {
    match &mut statement.kind {
        StmtKind::Expr(expr) | StmtKind::Throw(expr) | StmtKind::Return(Some(expr)) => {
            expr.walk(visitor)
        }
        StmtKind::Var(decl) => decl.walk(visitor),
        StmtKind::Block(block) => block.walk(visitor),
        StmtKind::If(if_stmt) => {
            if_stmt.test.walk(visitor)?;
            if_stmt.consequent.walk(visitor)?;
            if let Some(alternate) = &mut if_stmt.alternate {
                alternate.walk(visitor)?;
            }
            Ok(())
        }
        StmtKind::While(while_stmt) => {
            while_stmt.test.walk(visitor)?;
            while_stmt.body.walk(visitor)
        }
        StmtKind::DoWhile(do_while) => {
            do_while.body.walk(visitor)?;
            do_while.test.walk(visitor)
        }
        StmtKind::For(for_stmt) => {
            match &mut for_stmt.init {
                Some(ForInit::Var(decl)) => decl.walk(visitor)?,
                Some(ForInit::Expr(expr)) => expr.walk(visitor)?,
                None => {}
            }
            if let Some(test) = &mut for_stmt.test {
                test.walk(visitor)?;
            }
            if let Some(update) = &mut for_stmt.update {
                update.walk(visitor)?;
            }
            for_stmt.body.walk(visitor)
        }
        StmtKind::Try(try_stmt) => {
            try_stmt.block.walk(visitor)?;
            if let Some(handler) = &mut try_stmt.handler {
                handler.walk(visitor)?;
            }
            if let Some(finalizer) = &mut try_stmt.finalizer {
                finalizer.walk(visitor)?;
            }
            Ok(())
        }
        StmtKind::Switch(switch) => {
            switch.discriminant.walk(visitor)?;
            for case in &mut switch.cases {
                case.walk(visitor)?;
            }
            Ok(())
        }
        StmtKind::Function(function) => function.walk(visitor),
        StmtKind::Class(class) => class.walk(visitor),
        StmtKind::Export(export) => export.declaration.walk(visitor),
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::Empty => Ok(()),
    }
});

impl_walk!(VarDecl, |decl, visitor| {
    for declarator in &mut decl.declarations {
        if let Some(init) = &mut declarator.init {
            init.walk(visitor)?;
        }
    }
    Ok(())
});

impl_walk!(Class, |class, visitor| {
    for method in &mut class.methods {
        method.function.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(SwitchCase, visit_switch_case, |case, visitor| {
    if let Some(test) = &mut case.test {
        test.walk(visitor)?;
    }
    case.consequent.walk(visitor)
});

impl_walk!(CatchClause, visit_catch_clause, |clause, visitor| clause.body.walk(visitor));

impl_walk!(Function, visit_function, |function, visitor| {
    match &mut function.body {
        FunctionBody::Block(block) => block.walk(visitor),
        FunctionBody::Expr(expr) => expr.walk(visitor),
    }
});

impl_walk!(Expr, visit_expression, |expression, visitor| {
    match &mut expression.kind {
        ExprKind::Number(_) |
        ExprKind::String(_) |
        ExprKind::Bool(_) |
        ExprKind::Null |
        ExprKind::Ident(_) |
        ExprKind::This |
        ExprKind::Counter(_) => Ok(()),
        ExprKind::Array(exprs) | ExprKind::Sequence(exprs) => {
            for expr in exprs {
                expr.walk(visitor)?;
            }
            Ok(())
        }
        ExprKind::Object(properties) => {
            for property in properties {
                property.value.walk(visitor)?;
            }
            Ok(())
        }
        ExprKind::Unary { arg, .. } => arg.walk(visitor),
        ExprKind::Update { target, .. } => target.walk(visitor),
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            left.walk(visitor)?;
            right.walk(visitor)
        }
        ExprKind::Assign { target, value, .. } => {
            target.walk(visitor)?;
            value.walk(visitor)
        }
        ExprKind::Conditional { test, consequent, alternate } => {
            test.walk(visitor)?;
            consequent.walk(visitor)?;
            alternate.walk(visitor)
        }
        ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
            callee.walk(visitor)?;
            for arg in args {
                arg.walk(visitor)?;
            }
            Ok(())
        }
        ExprKind::Member { object, property } => {
            object.walk(visitor)?;
            match property {
                MemberProp::Computed(property) => property.walk(visitor),
                MemberProp::Named(_) => Ok(()),
            }
        }
        ExprKind::Function(function) => function.walk(visitor),
    }
});

impl<T: Walk> Walk for Box<T> {
    fn walk(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        (**self).walk(visitor)
    }
}

#[cfg(test)]
mod tests {
    use adana_syntax::parse;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        skip_functions: bool,
    }

    impl Visitor for Recorder {
        fn visit_statement(&mut self, statement: &mut Stmt) -> Result<VisitFlow> {
            let name = match statement.kind {
                StmtKind::If(_) => "if",
                StmtKind::Expr(_) => "expr",
                StmtKind::Block(_) => "block",
                StmtKind::Function(_) => "function",
                _ => "other",
            };
            self.events.push(format!("enter {name}"));
            Ok(VisitFlow::Continue)
        }

        fn post_visit_statement(&mut self, _statement: &mut Stmt) -> Result<()> {
            self.events.push("exit".to_string());
            Ok(())
        }

        fn visit_function(&mut self, _function: &mut Function) -> Result<VisitFlow> {
            Ok(if self.skip_functions { VisitFlow::Skip } else { VisitFlow::Continue })
        }
    }

    #[test]
    fn test_walk_order() {
        let mut program = parse("if (a) { b(); }").unwrap();
        let mut recorder = Recorder::default();
        program.walk(&mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec!["enter if", "enter block", "enter expr", "exit", "exit", "exit"]
        );
    }

    #[test]
    fn test_skip_prunes_children() {
        let mut program = parse("function f() { a(); }").unwrap();
        let mut recorder = Recorder { skip_functions: true, ..Default::default() };
        program.walk(&mut recorder).unwrap();
        assert_eq!(recorder.events, vec!["enter function", "exit"]);
    }

    #[test]
    fn test_post_visit_can_rewrite() {
        struct Renamer;
        impl Visitor for Renamer {
            fn post_visit_expression(&mut self, expression: &mut Expr) -> Result<()> {
                if let ExprKind::Ident(name) = &mut expression.kind {
                    name.push('_');
                }
                Ok(())
            }
        }

        let mut program = parse("a + b").unwrap();
        program.walk(&mut Renamer).unwrap();
        let StmtKind::Expr(expr) = &program.body[0].kind else { panic!("not an expression") };
        let ExprKind::Binary { left, right, .. } = &expr.kind else { panic!("not binary") };
        assert_eq!(left.kind, ExprKind::Ident("a_".to_string()));
        assert_eq!(right.kind, ExprKind::Ident("b_".to_string()));
    }
}
