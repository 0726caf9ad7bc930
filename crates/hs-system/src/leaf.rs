//! Type-erased storage for one leaf and its records.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::component::Component;
use crate::error::ComponentResult;

pub(crate) trait ErasedLeaf<C>: Send {
    fn continuous_update(
        &mut self,
        x: &[f64],
        t: f64,
        ctx: &C,
        xdot: &mut [f64],
    ) -> ComponentResult<()>;

    fn discrete_update(&mut self, x: &mut [f64], t: f64, ctx: &C) -> ComponentResult<bool>;

    fn post_step(&mut self, x: &mut [f64], t: f64, ctx: &C) -> ComponentResult<bool>;

    fn reset_discrete(&mut self);

    fn shared_output(&self) -> Arc<dyn Any + Send + Sync>;

    fn output_any(&self) -> &dyn Any;

    fn input_any(&self) -> &dyn Any;

    fn input_any_mut(&mut self) -> &mut dyn Any;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct Leaf<K: Component<C>, C> {
    pub(crate) component: K,
    pub(crate) input: K::Input,
    pub(crate) discrete: K::Discrete,
    pub(crate) output: K::Output,
    initial_discrete: K::Discrete,
    _ctx: PhantomData<fn(&C)>,
}

impl<K: Component<C>, C> Leaf<K, C> {
    pub(crate) fn new(component: K) -> Self {
        let initial_discrete = component.initial_discrete();
        Self {
            component,
            input: K::Input::default(),
            discrete: initial_discrete.clone(),
            output: K::Output::default(),
            initial_discrete,
            _ctx: PhantomData,
        }
    }
}

impl<K, C> ErasedLeaf<C> for Leaf<K, C>
where
    K: Component<C>,
    C: 'static,
{
    fn continuous_update(
        &mut self,
        x: &[f64],
        t: f64,
        ctx: &C,
        xdot: &mut [f64],
    ) -> ComponentResult<()> {
        self.output =
            self.component
                .continuous_update(x, &self.input, &self.discrete, t, ctx, xdot)?;
        Ok(())
    }

    fn discrete_update(&mut self, x: &mut [f64], t: f64, ctx: &C) -> ComponentResult<bool> {
        self.component
            .discrete_update(x, &self.input, &mut self.discrete, t, ctx)
    }

    fn post_step(&mut self, x: &mut [f64], t: f64, ctx: &C) -> ComponentResult<bool> {
        self.component
            .post_step(x, &self.input, &self.discrete, t, ctx)
    }

    fn reset_discrete(&mut self) {
        self.discrete = self.initial_discrete.clone();
    }

    fn shared_output(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::new(self.output.clone())
    }

    fn output_any(&self) -> &dyn Any {
        &self.output
    }

    fn input_any(&self) -> &dyn Any {
        &self.input
    }

    fn input_any_mut(&mut self) -> &mut dyn Any {
        &mut self.input
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
